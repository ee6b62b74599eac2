fn sanitize_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_sep = false;
    for ch in value.chars() {
        if ch.is_ascii_whitespace() {
            if !out.is_empty() && !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else if ch.is_ascii_graphic() {
            out.push(ch);
            prev_sep = false;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "na".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Single-line machine-greppable warning for degraded-but-continuing
/// outcomes (report save failed, cascade partial).
pub fn emit(code: &str, stage: &str, target: &str, reason: &str, err: &str) {
    eprintln!(
        "EVLOCK_WARN code={} stage={} target={} reason={} err={}",
        sanitize_value(code),
        sanitize_value(stage),
        sanitize_value(target),
        sanitize_value(reason),
        sanitize_value(err),
    );
}
