use anyhow::{Error, Result};
use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command};
use log::{error, info};
use overlay_captions::{OverlayDownload, OverlayDownloadBuilder, Platform, SettingsStore};
use std::{path::Path, process, str::FromStr};
use strum::VariantNames;
use thiserror::Error;

#[derive(Debug, Error)]
enum CliError {
    #[error("{0:}")]
    InvalidArgsError(String),
    #[error("release {tag} has no compatible download for {platform}")]
    NoCompatibleDownload { tag: String, platform: Platform },
}

enum Action<'a> {
    Download {
        overlay_download: OverlayDownload<'a>,
        download_to: Option<&'a Path>,
    },
    ShowSettings(SettingsStore),
    ResetSettings(SettingsStore),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cmd = cmd();
    let matches = cmd.get_matches();
    let res = init_logger_from_matches(&matches);
    if let Err(e) = res {
        eprintln!("Error creating logger: {e}");
        process::exit(126);
    }

    let status = match make_action(&matches) {
        Ok(action) => match run(action).await {
            Ok(()) => 0,
            Err(e) => {
                print_err(&e);
                if matches!(
                    e.downcast_ref::<CliError>(),
                    Some(CliError::NoCompatibleDownload { .. })
                ) {
                    2
                } else {
                    1
                }
            }
        },
        Err(e) => {
            print_err(&e);
            127
        }
    };
    process::exit(status);
}

const MAX_TERM_WIDTH: usize = 100;

fn cmd() -> Command {
    Command::new("overlay-captions")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Finds the overlay captions installer for your platform and manages its settings")
        .arg(
            Arg::new("platform")
                .long("platform")
                .short('p')
                .value_parser(clap::builder::PossibleValuesParser::new(Platform::VARIANTS))
                .help(concat!(
                    "The platform to find an installer for. Defaults to the platform this tool",
                    " was built for.",
                )),
        )
        .arg(
            Arg::new("user-agent")
                .long("user-agent")
                .help("A browser user agent string to guess the platform from."),
        )
        .arg(Arg::new("releases-url").long("releases-url").help(concat!(
            "The URL of the release feed. Defaults to the value of the",
            " OVERLAY_CAPTIONS_RELEASES_URL env var, or the public releases endpoint if that is",
            " not set.",
        )))
        .arg(Arg::new("marker").long("marker").help(concat!(
            "The string that installer file names must contain. Defaults to",
            " Jutukuva.Subtiitrid.",
        )))
        .arg(
            Arg::new("download-to")
                .long("download-to")
                .short('i')
                .help(concat!(
                    "Download the installer into this directory instead of just printing its",
                    " URL. The directory is created if needed.",
                )),
        )
        .arg(
            Arg::new("show-settings")
                .long("show-settings")
                .action(ArgAction::SetTrue)
                .help("Print the stored app settings as JSON, with defaults filled in."),
        )
        .arg(
            Arg::new("reset-settings")
                .long("reset-settings")
                .action(ArgAction::SetTrue)
                .help("Reset the stored app settings to their defaults."),
        )
        .arg(Arg::new("settings-file").long("settings-file").help(concat!(
            "The settings file to use with --show-settings or --reset-settings. Defaults to",
            " settings.json in the per-user config directory.",
        )))
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable verbose output."),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .action(ArgAction::SetTrue)
                .help("Enable debugging output."),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Suppresses most output."),
        )
        .group(ArgGroup::new("log-level").args(["verbose", "debug", "quiet"]))
        .max_term_width(MAX_TERM_WIDTH)
}

pub(crate) fn init_logger_from_matches(matches: &ArgMatches) -> Result<(), log::SetLoggerError> {
    let level = if matches.get_flag("debug") {
        log::LevelFilter::Debug
    } else if matches.get_flag("verbose") {
        log::LevelFilter::Info
    } else if matches.get_flag("quiet") {
        log::LevelFilter::Error
    } else {
        log::LevelFilter::Warn
    };

    overlay_captions::init_logger(level)
}

fn make_action(matches: &ArgMatches) -> Result<Action<'_>> {
    validate_args(matches)?;

    let settings_store = || {
        matches
            .get_one::<String>("settings-file")
            .map_or_else(SettingsStore::in_config_dir, SettingsStore::new)
            .with_env_overrides()
    };
    if matches.get_flag("show-settings") {
        return Ok(Action::ShowSettings(settings_store()?));
    }
    if matches.get_flag("reset-settings") {
        return Ok(Action::ResetSettings(settings_store()?));
    }

    let mut builder = OverlayDownloadBuilder::new();
    if let Some(p) = matches.get_one::<String>("platform") {
        builder = builder.platform(Platform::from_str(p)?);
    }
    if let Some(ua) = matches.get_one::<String>("user-agent") {
        builder = builder.user_agent(ua);
    }
    if let Some(url) = matches.get_one::<String>("releases-url") {
        builder = builder.releases_url(url);
    }
    if let Some(m) = matches.get_one::<String>("marker") {
        builder = builder.marker(m);
    }

    Ok(Action::Download {
        overlay_download: builder.build()?,
        download_to: matches
            .get_one::<String>("download-to")
            .map(|d| Path::new(d.as_str())),
    })
}

fn validate_args(matches: &ArgMatches) -> Result<()> {
    if matches.contains_id("platform") && matches.contains_id("user-agent") {
        return Err(CliError::InvalidArgsError(
            "You cannot combine the --platform and --user-agent options".to_string(),
        )
        .into());
    }

    let settings_flags = ["show-settings", "reset-settings"]
        .into_iter()
        .filter(|a| matches.get_flag(a))
        .collect::<Vec<_>>();
    if settings_flags.len() > 1 {
        return Err(CliError::InvalidArgsError(
            "You cannot combine the --show-settings and --reset-settings options".to_string(),
        )
        .into());
    }

    if let Some(flag) = settings_flags.first() {
        for a in &["platform", "user-agent", "releases-url", "marker", "download-to"] {
            if matches.contains_id(a) {
                return Err(CliError::InvalidArgsError(format!(
                    "You cannot combine the --{flag} and --{a} options"
                ))
                .into());
            }
        }
    } else if matches.contains_id("settings-file") {
        return Err(CliError::InvalidArgsError(
            "The --settings-file option only makes sense with --show-settings or --reset-settings"
                .to_string(),
        )
        .into());
    }

    Ok(())
}

async fn run(action: Action<'_>) -> Result<()> {
    match action {
        Action::Download {
            overlay_download,
            download_to,
        } => {
            let platform = overlay_download.platform();
            let release = overlay_download.latest_release().await?;
            let Some(asset) = overlay_download.asset_for(&release).cloned() else {
                return Err(CliError::NoCompatibleDownload {
                    tag: release.tag_name,
                    platform,
                }
                .into());
            };

            info!("Release {} has {} for {platform}", release.tag_name, asset.name);
            if let Some(dir) = download_to {
                let path = overlay_download.download_installer(&asset, dir).await?;
                println!("{}", path.display());
            } else {
                println!("{}", asset.download_url);
            }
        }
        Action::ShowSettings(store) => {
            let settings = store.load();
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        Action::ResetSettings(store) => {
            store.save(store.defaults())?;
            info!("Reset settings in {}", store.path().display());
        }
    }

    Ok(())
}

fn print_err(e: &Error) {
    error!("{e:#}");
    if let Some(ce) = e.downcast_ref::<CliError>() {
        match ce {
            CliError::InvalidArgsError(_) => {
                println!();
                if let Err(e) = cmd().print_help() {
                    eprintln!("Error printing help: {e}");
                }
            }
            CliError::NoCompatibleDownload { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn matches_for(args: &[&str]) -> Result<ArgMatches> {
        Ok(cmd().try_get_matches_from(
            std::iter::once("overlay-captions").chain(args.iter().copied()),
        )?)
    }

    #[rstest]
    #[case::no_args(&[])]
    #[case::platform(&["--platform", "windows"])]
    #[case::user_agent(&["--user-agent", "Mozilla/5.0 (X11; Linux x86_64)"])]
    #[case::download(&["--platform", "linux", "--download-to", "/tmp/x"])]
    #[case::show_settings(&["--show-settings"])]
    #[case::show_settings_with_file(&["--show-settings", "--settings-file", "s.json"])]
    #[case::reset_settings(&["--reset-settings", "--settings-file", "s.json"])]
    fn valid_args(#[case] args: &[&str]) -> Result<()> {
        validate_args(&matches_for(args)?)
    }

    #[rstest]
    #[case::platform_and_user_agent(
        &["--platform", "macos", "--user-agent", "Mozilla/5.0"],
        "You cannot combine the --platform and --user-agent options"
    )]
    #[case::show_and_reset(
        &["--show-settings", "--reset-settings"],
        "You cannot combine the --show-settings and --reset-settings options"
    )]
    #[case::settings_and_download(
        &["--show-settings", "--download-to", "dir"],
        "You cannot combine the --show-settings and --download-to options"
    )]
    #[case::settings_file_alone(
        &["--settings-file", "s.json"],
        "The --settings-file option only makes sense with --show-settings or --reset-settings"
    )]
    fn invalid_args(#[case] args: &[&str], #[case] expect: &str) -> Result<()> {
        let err = validate_args(&matches_for(args)?).expect_err("args should be rejected");
        assert_eq!(err.to_string(), expect);
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::InvalidArgsError(_))
        ));
        Ok(())
    }

    #[test]
    fn unknown_platform_is_rejected_by_clap() {
        assert!(matches_for(&["--platform", "beos"]).is_err());
    }

    #[test]
    fn log_level_flags_conflict() {
        assert!(matches_for(&["--debug", "--quiet"]).is_err());
    }
}
