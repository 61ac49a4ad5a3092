//! Mediated host functions: the only way a sandboxed plugin reaches
//! the outside world. Every function here checks the calling
//! plugin's grant before doing anything, using the capability key
//! derived from the request itself (not a capability the guest
//! chooses), and never panics on malformed guest input.

mod dns;
mod exec;
mod http;
mod log;
mod smtp;
mod ssrf;
mod tcp;

use wasmtime::{Caller, Linker};

use crate::error::Result as RuntimeResult;
use crate::sandbox::StoreData;
use crate::wire::{self, capability_denied_response, config_error_response, respond, WireResponse};

/// Run a future to completion from inside a synchronous wasmtime host
/// function. Sandboxed invocations always execute on a thread with an
/// active tokio runtime (the engine enters it before calling
/// `observe`), so `block_in_place` + `Handle::block_on` is safe here
/// without spinning up a nested runtime.
fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(fut))
}

/// Register every mediated host function under the `env` module,
/// matching the guest ABI's namespace convention.
pub fn register_all(linker: &mut Linker<StoreData>) -> RuntimeResult<()> {
    register_dns_lookup(linker)?;
    register_http_request(linker)?;
    register_tcp_connect(linker)?;
    register_smtp_connect(linker)?;
    register_exec_command(linker)?;
    register_log_message(linker)?;
    Ok(())
}

fn map_link_err(name: &str, e: impl std::fmt::Display) -> crate::error::Error {
    crate::error::Error::load(name, format!("failed to register host function: {e}"))
}

fn register_dns_lookup(linker: &mut Linker<StoreData>) -> RuntimeResult<()> {
    linker
        .func_wrap(
            "env",
            "dns_lookup",
            |mut caller: Caller<'_, StoreData>, packed: u64| -> u64 {
                if caller.data_mut().check_limits().is_err() {
                    return 0;
                }
                let request: dns::DnsLookupRequest = match wire::read_request(&mut caller, packed) {
                    Ok(r) => r,
                    Err(e) => return respond(&mut caller, config_error_response::<dns::DnsLookupResponse>(e.to_string())).unwrap_or(0),
                };
                if !dns::capability_granted(&caller.data().grant) {
                    return respond(&mut caller, capability_denied_response::<dns::DnsLookupResponse>("network:outbound:53")).unwrap_or(0);
                }
                match block_on(dns::lookup(&request)) {
                    Ok(response) => respond(&mut caller, WireResponse::ok(response)).unwrap_or(0),
                    Err(e) => respond(&mut caller, config_error_response::<dns::DnsLookupResponse>(e.to_string())).unwrap_or(0),
                }
            },
        )
        .map_err(|e| map_link_err("dns_lookup", e))?;
    Ok(())
}

fn register_http_request(linker: &mut Linker<StoreData>) -> RuntimeResult<()> {
    linker
        .func_wrap(
            "env",
            "http_request",
            |mut caller: Caller<'_, StoreData>, packed: u64| -> u64 {
                if caller.data_mut().check_limits().is_err() {
                    return 0;
                }
                let request: http::HttpRequest = match wire::read_request(&mut caller, packed) {
                    Ok(r) => r,
                    Err(e) => return respond(&mut caller, config_error_response::<http::HttpResponse>(e.to_string())).unwrap_or(0),
                };
                let host_port = match http::required_capability(&request.url) {
                    Ok(hp) => hp,
                    Err(e) => return respond(&mut caller, config_error_response::<http::HttpResponse>(e.to_string())).unwrap_or(0),
                };
                if !http::is_authorized(&caller.data().grant, &host_port) {
                    let cap = format!("network:outbound:{}", host_port.1);
                    return respond(&mut caller, capability_denied_response::<http::HttpResponse>(&cap)).unwrap_or(0);
                }
                match block_on(http::send(&request)) {
                    Ok(response) => respond(&mut caller, WireResponse::ok(response)).unwrap_or(0),
                    Err(e) => respond(&mut caller, config_error_response::<http::HttpResponse>(e.to_string())).unwrap_or(0),
                }
            },
        )
        .map_err(|e| map_link_err("http_request", e))?;
    Ok(())
}

fn register_tcp_connect(linker: &mut Linker<StoreData>) -> RuntimeResult<()> {
    linker
        .func_wrap(
            "env",
            "tcp_connect",
            |mut caller: Caller<'_, StoreData>, packed: u64| -> u64 {
                if caller.data_mut().check_limits().is_err() {
                    return 0;
                }
                let request: tcp::TcpConnectRequest = match wire::read_request(&mut caller, packed) {
                    Ok(r) => r,
                    Err(e) => return respond(&mut caller, config_error_response::<tcp::TcpConnectResponse>(e.to_string())).unwrap_or(0),
                };
                if !tcp::is_authorized(&caller.data().grant, &request) {
                    let cap = format!("network:outbound:{}", request.port);
                    return respond(&mut caller, capability_denied_response::<tcp::TcpConnectResponse>(&cap)).unwrap_or(0);
                }
                match block_on(tcp::connect(&request)) {
                    Ok(response) => respond(&mut caller, WireResponse::ok(response)).unwrap_or(0),
                    Err(e) => respond(&mut caller, config_error_response::<tcp::TcpConnectResponse>(e.to_string())).unwrap_or(0),
                }
            },
        )
        .map_err(|e| map_link_err("tcp_connect", e))?;
    Ok(())
}

fn register_smtp_connect(linker: &mut Linker<StoreData>) -> RuntimeResult<()> {
    linker
        .func_wrap(
            "env",
            "smtp_connect",
            |mut caller: Caller<'_, StoreData>, packed: u64| -> u64 {
                if caller.data_mut().check_limits().is_err() {
                    return 0;
                }
                let request: smtp::SmtpConnectRequest = match wire::read_request(&mut caller, packed) {
                    Ok(r) => r,
                    Err(e) => return respond(&mut caller, config_error_response::<smtp::SmtpConnectResponse>(e.to_string())).unwrap_or(0),
                };
                if !smtp::is_authorized(&caller.data().grant, &request) {
                    let cap = format!("network:outbound:{}", request.port);
                    return respond(&mut caller, capability_denied_response::<smtp::SmtpConnectResponse>(&cap)).unwrap_or(0);
                }
                match block_on(smtp::connect(&request)) {
                    Ok(response) => respond(&mut caller, WireResponse::ok(response)).unwrap_or(0),
                    Err(e) => respond(&mut caller, config_error_response::<smtp::SmtpConnectResponse>(e.to_string())).unwrap_or(0),
                }
            },
        )
        .map_err(|e| map_link_err("smtp_connect", e))?;
    Ok(())
}

fn register_exec_command(linker: &mut Linker<StoreData>) -> RuntimeResult<()> {
    linker
        .func_wrap(
            "env",
            "exec_command",
            |mut caller: Caller<'_, StoreData>, packed: u64| -> u64 {
                if caller.data_mut().check_limits().is_err() {
                    return 0;
                }
                let request: exec::ExecCommandRequest = match wire::read_request(&mut caller, packed) {
                    Ok(r) => r,
                    Err(e) => return respond(&mut caller, config_error_response::<exec::ExecCommandResponse>(e.to_string())).unwrap_or(0),
                };
                let classification = exec::classify(&request.command, &request.args);
                if !exec::is_authorized(&caller.data().grant, &request.command) {
                    let message = exec::denial_message(classification, &request.command);
                    return respond(&mut caller, wire::capability_denied_response_with_message::<exec::ExecCommandResponse>(message))
                        .unwrap_or(0);
                }
                tracing::info!(
                    plugin = %caller.data().plugin_name,
                    command = %request.command,
                    classification = ?classification,
                    "granted exec capability"
                );
                match block_on(exec::execute(&request)) {
                    Ok(mut response) => {
                        let redactor = caller.data().redactor.clone();
                        response.stdout = redactor.scrub_string(&response.stdout);
                        response.stderr = redactor.scrub_string(&response.stderr);
                        respond(&mut caller, WireResponse::ok(response)).unwrap_or(0)
                    }
                    Err(e) => {
                        let detail = if matches!(e, crate::error::Error::Timeout(_)) {
                            cce_core::ErrorDetail::timeout(e.to_string())
                        } else {
                            cce_core::ErrorDetail::execution(e.to_string())
                        };
                        respond(&mut caller, wire::error_response::<exec::ExecCommandResponse>(detail)).unwrap_or(0)
                    }
                }
            },
        )
        .map_err(|e| map_link_err("exec_command", e))?;
    Ok(())
}

fn register_log_message(linker: &mut Linker<StoreData>) -> RuntimeResult<()> {
    linker
        .func_wrap(
            "env",
            "log_message",
            |mut caller: Caller<'_, StoreData>, packed: u64| -> u64 {
                if caller.data_mut().check_limits().is_err() {
                    return 0;
                }
                let record: log::LogRecord = match wire::read_request(&mut caller, packed) {
                    Ok(r) => r,
                    Err(e) => return respond(&mut caller, config_error_response::<log::LogMessageResponse>(e.to_string())).unwrap_or(0),
                };
                let redactor = caller.data().redactor.clone();
                let response = log::emit(&record, &redactor);
                respond(&mut caller, WireResponse::ok(response)).unwrap_or(0)
            },
        )
        .map_err(|e| map_link_err("log_message", e))?;
    Ok(())
}
