use crate::os::{MACOS_USER_AGENT_MARKER, WINDOWS_USER_AGENT_MARKER};
use log::debug;
use platforms::OS;

/// The desktop platforms that the overlay app ships an installer for.
#[derive(
    strum::AsRefStr,
    Clone,
    Copy,
    Debug,
    strum::Display,
    strum::EnumString,
    Eq,
    Hash,
    PartialEq,
    strum::VariantNames,
)]
#[strum(ascii_case_insensitive)]
pub enum Platform {
    #[strum(serialize = "windows")]
    Windows,
    #[strum(serialize = "macos")]
    MacOS,
    #[strum(serialize = "linux")]
    Linux,
}

impl Platform {
    const TARGET: &'static str = env!("TARGET");

    /// Returns the platform this binary was compiled for. Anything that is not Windows or macOS is
    /// treated as Linux.
    #[must_use]
    pub fn current() -> Platform {
        Self::from_target(Self::TARGET)
    }

    /// Guesses the platform from a browser user agent string. See [`detect_platform`].
    #[must_use]
    pub fn from_user_agent(user_agent: &str) -> Platform {
        detect_platform(user_agent)
    }

    fn from_target(target: &str) -> Platform {
        let Some(p) = platforms::Platform::find(target) else {
            debug!("unknown compile target `{target}`, assuming Linux");
            return Platform::Linux;
        };

        let platform = if p.target_os == OS::Windows {
            Platform::Windows
        } else if p.target_os == OS::MacOS {
            Platform::MacOS
        } else {
            Platform::Linux
        };
        debug!("compile target `{target}` maps to {platform}");
        platform
    }
}

/// Guesses the platform from a browser user agent string.
///
/// The agent is lower-cased and checked for a Windows marker first, then a macOS marker. Anything
/// else, including an empty or unrecognized agent, is treated as Linux. This is a heuristic, so a
/// spoofed or unusual agent can be misclassified.
#[must_use]
pub fn detect_platform(user_agent: &str) -> Platform {
    let ua = user_agent.to_lowercase();
    if ua.contains(WINDOWS_USER_AGENT_MARKER) {
        Platform::Windows
    } else if ua.contains(MACOS_USER_AGENT_MARKER) {
        Platform::MacOS
    } else {
        Platform::Linux
    }
}
