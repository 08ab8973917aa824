use lazy_regex::{regex, Lazy};
use regex::Regex;

// Substrings looked for in a lower-cased user agent. "win" covers "windows nt" and "win64", "mac"
// covers "macintosh" and "mac os x".
pub(crate) const WINDOWS_USER_AGENT_MARKER: &str = "win";
pub(crate) const MACOS_USER_AGENT_MARKER: &str = "mac";

pub(crate) fn windows_installer_re() -> &'static Lazy<Regex> {
    regex!(r"(?i:\.exe$)")
}

pub(crate) fn macos_installer_re() -> &'static Lazy<Regex> {
    regex!(r"(?i:\.dmg$)")
}

pub(crate) fn linux_installer_re() -> &'static Lazy<Regex> {
    regex!(r"(?i:\.appimage$)")
}
