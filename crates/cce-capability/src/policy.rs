//! Pattern-match rules deciding whether a granted capability covers a
//! requested one. Every function here must be panic-free: malformed
//! patterns are non-matches, never crashes.

use crate::capability::{Capability, Kind};
use crate::grant::Grant;

/// Whether `grant` authorizes `request`. `request` is itself a
/// `Capability` (kind must match exactly; pattern matching is
/// kind-specific).
#[must_use]
pub fn is_granted(grant: &Grant, request: &Capability) -> bool {
    grant
        .iter()
        .any(|granted| granted.kind == request.kind && kind_matches(request.kind, &granted.pattern, &request.pattern))
}

fn kind_matches(kind: Kind, granted: &str, requested: &str) -> bool {
    match kind {
        Kind::Fs => fs_matches(granted, requested),
        Kind::Exec => exec_matches(granted, requested),
        Kind::Env => env_matches(granted, requested),
        Kind::Network => network_matches(granted, requested),
    }
}

/// `fs`: grant `<op>:<glob>` matches request `<op>:<path>` iff the
/// operations are equal and `<glob>` matches `<path>` (`*` = one path
/// segment, `**` = zero or more segments). A request path containing a
/// `..` segment is always rejected.
fn fs_matches(granted: &str, requested: &str) -> bool {
    let Some((grant_op, grant_glob)) = Capability::split_op(granted) else {
        return false;
    };
    let Some((req_op, req_path)) = Capability::split_op(requested) else {
        return false;
    };
    if grant_op != req_op {
        return false;
    }
    if has_dotdot_segment(req_path) {
        return false;
    }
    glob_match_path(grant_glob, req_path)
}

fn has_dotdot_segment(path: &str) -> bool {
    path.split('/').any(|seg| seg == "..")
}

fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|seg| !seg.is_empty()).collect()
}

fn glob_match_path(glob: &str, path: &str) -> bool {
    let pat = path_segments(glob);
    let target = path_segments(path);
    match_segments(&pat, &target)
}

fn match_segments(pat: &[&str], path: &[&str]) -> bool {
    match pat.split_first() {
        None => path.is_empty(),
        Some((&"**", rest)) => {
            match_segments(rest, path) || (!path.is_empty() && match_segments(pat, &path[1..]))
        }
        Some((&head, rest)) => match path.split_first() {
            Some((&seg, path_rest)) if head == "*" || head == seg => match_segments(rest, path_rest),
            _ => false,
        },
    }
}

/// `exec`: exact match, or a grant ending in `/*` matches any request
/// whose directory component equals the grant's prefix.
fn exec_matches(granted: &str, requested: &str) -> bool {
    if granted == requested {
        return true;
    }
    let Some(prefix) = granted.strip_suffix("/*") else {
        return false;
    };
    let dir_end = match requested.rfind('/') {
        Some(idx) => idx + 1,
        None => return false,
    };
    &requested[..dir_end] == format!("{prefix}/")
}

/// `env`: exact match, or a grant ending in `*` matches any request
/// whose key starts with the grant's prefix.
fn env_matches(granted: &str, requested: &str) -> bool {
    if granted == requested {
        return true;
    }
    match granted.strip_suffix('*') {
        Some(prefix) => requested.starts_with(prefix),
        None => false,
    }
}

/// `network`: grant `outbound:<spec>` matches request `outbound:<q>`
/// where `<spec>` is `*` (any), a comma-separated list of ports and
/// inclusive ranges, or a literal equal to `<q>`. Non-numeric,
/// out-of-range, or inverted-range values are non-matches, never
/// panics.
fn network_matches(granted: &str, requested: &str) -> bool {
    if granted == requested {
        return true;
    }
    let Some(spec) = granted.strip_prefix("outbound:") else {
        return false;
    };
    let Some(q) = requested.strip_prefix("outbound:") else {
        return false;
    };
    if spec == "*" {
        return true;
    }
    if spec == q {
        return true;
    }
    let Ok(q_port) = q.parse::<i64>() else {
        return false;
    };
    if !(1..=65535).contains(&q_port) {
        return false;
    }
    spec.split(',').any(|token| port_token_matches(token.trim(), q_port))
}

fn port_token_matches(token: &str, q_port: i64) -> bool {
    match token.split_once('-') {
        Some((lo, hi)) => {
            let (Ok(lo), Ok(hi)) = (lo.trim().parse::<i64>(), hi.trim().parse::<i64>()) else {
                return false;
            };
            lo <= hi && (1..=65535).contains(&lo) && (1..=65535).contains(&hi) && (lo..=hi).contains(&q_port)
        }
        None => token.parse::<i64>().is_ok_and(|p| p == q_port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Kind;

    fn grant_of(kind: Kind, pattern: &str) -> Grant {
        Grant::from_capabilities([Capability::of(kind, pattern)])
    }

    #[test]
    fn fs_glob_star_matches_single_segment_only() {
        let grant = grant_of(Kind::Fs, "read:/etc/*");
        assert!(is_granted(&grant, &Capability::of(Kind::Fs, "read:/etc/passwd")));
        assert!(!is_granted(&grant, &Capability::of(Kind::Fs, "read:/etc/ssh/sshd_config")));
    }

    #[test]
    fn fs_glob_doublestar_matches_any_depth() {
        let grant = grant_of(Kind::Fs, "read:/etc/**");
        assert!(is_granted(&grant, &Capability::of(Kind::Fs, "read:/etc/passwd")));
        assert!(is_granted(&grant, &Capability::of(Kind::Fs, "read:/etc/ssh/sshd_config")));
        assert!(is_granted(&grant, &Capability::of(Kind::Fs, "read:/etc")));
    }

    #[test]
    fn fs_dotdot_segment_always_rejected() {
        let grant = grant_of(Kind::Fs, "read:/tmp/**");
        assert!(!is_granted(&grant, &Capability::of(Kind::Fs, "read:/tmp/../etc/passwd")));
    }

    #[test]
    fn fs_operation_mismatch_rejected() {
        let grant = grant_of(Kind::Fs, "read:/tmp/**");
        assert!(!is_granted(&grant, &Capability::of(Kind::Fs, "write:/tmp/a")));
    }

    #[test]
    fn exec_directory_wildcard() {
        let grant = grant_of(Kind::Exec, "/usr/local/bin/*");
        assert!(is_granted(&grant, &Capability::of(Kind::Exec, "/usr/local/bin/rg")));
        assert!(!is_granted(&grant, &Capability::of(Kind::Exec, "/usr/bin/rg")));
        assert!(!is_granted(&grant, &Capability::of(Kind::Exec, "rg")));
    }

    #[test]
    fn env_prefix_wildcard() {
        let grant = grant_of(Kind::Env, "MY_APP_*");
        assert!(is_granted(&grant, &Capability::of(Kind::Env, "MY_APP_TOKEN")));
        assert!(!is_granted(&grant, &Capability::of(Kind::Env, "AWS_SECRET")));
    }

    #[test]
    fn network_port_range_boundaries() {
        let grant = grant_of(Kind::Network, "outbound:8000-65535");
        assert!(is_granted(&grant, &Capability::of(Kind::Network, "outbound:65535")));
        assert!(!is_granted(&grant, &Capability::of(Kind::Network, "outbound:65536")));
        assert!(!is_granted(&grant, &Capability::of(Kind::Network, "outbound:-1")));
        assert!(!is_granted(&grant, &Capability::of(Kind::Network, "outbound:7999")));
    }

    #[test]
    fn network_inverted_range_never_matches() {
        let grant = grant_of(Kind::Network, "outbound:9000-8000");
        assert!(!is_granted(&grant, &Capability::of(Kind::Network, "outbound:8500")));
    }

    #[test]
    fn network_wildcard_matches_any() {
        let grant = grant_of(Kind::Network, "outbound:*");
        assert!(is_granted(&grant, &Capability::of(Kind::Network, "outbound:443")));
        assert!(is_granted(&grant, &Capability::of(Kind::Network, "outbound:not-a-port")));
    }

    #[test]
    fn network_comma_list() {
        let grant = grant_of(Kind::Network, "outbound:80,443,8000-8100");
        assert!(is_granted(&grant, &Capability::of(Kind::Network, "outbound:443")));
        assert!(is_granted(&grant, &Capability::of(Kind::Network, "outbound:8050")));
        assert!(!is_granted(&grant, &Capability::of(Kind::Network, "outbound:9000")));
    }

    #[test]
    fn malformed_patterns_never_panic() {
        let grant = grant_of(Kind::Fs, "noop-no-colon");
        assert!(!is_granted(&grant, &Capability::of(Kind::Fs, "read:/tmp/a")));
        let grant = grant_of(Kind::Network, "outbound:abc-xyz");
        assert!(!is_granted(&grant, &Capability::of(Kind::Network, "outbound:80")));
    }
}
