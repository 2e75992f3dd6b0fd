//! psh: command-line entry point for the pshell parameter store.
//!
//! # Usage
//!
//! ```text
//! psh set env prompt '> ' --global
//! psh get env prompt
//! psh run setup.psh
//! ```
//!
//! Every invocation starts from an empty store; `run` keeps one store alive
//! for the whole script.

use std::path::PathBuf;
use std::process;

use pshell_core::cli::parse_args;
use pshell_core::command::Command;
use pshell_core::data::settings;
use pshell_core::sys::Sys;
use pshell_core::types::config::StoreSettings;
use pshell_core::types::protocol::Response;
use tracing::Level;


fn main() {
    let args: Vec<String> = std::env::args().collect();
    let arg_refs = command_args(&args);

    let cmd = match parse_args(&arg_refs) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("psh: {}", e);
            process::exit(1);
        }
    };

    let path = settings_path(std::env::var("PSH_CONFIG").ok(), std::env::var("HOME").ok());
    let store_settings = match settings::load(&path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("psh: failed to load settings: {}", e);
            process::exit(1);
        }
    };
    init_tracing(&store_settings);

    match execute(store_settings, cmd) {
        Response::Ok { output } => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Response::Error { message } => {
            eprintln!("psh error: {}", message);
            process::exit(1);
        }
    }
}


/// Arguments after the program name. An empty argv yields none.
fn command_args(args: &[String]) -> Vec<&str> {
    args.iter().skip(1).map(String::as_str).collect()
}


fn settings_path(override_path: Option<String>, home: Option<String>) -> PathBuf {
    if let Some(path) = override_path {
        return PathBuf::from(path);
    }
    let home = home.unwrap_or_else(|| "/tmp".into());
    PathBuf::from(home).join(".config").join("pshell").join("settings.yaml")
}


fn log_level(settings: &StoreSettings) -> Level {
    settings.log_level.parse().unwrap_or(Level::WARN)
}


fn init_tracing(settings: &StoreSettings) {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(log_level(settings))
        .with_writer(std::io::stderr)
        .init();
}


fn execute(settings: StoreSettings, cmd: Command) -> Response {
    let mut sys = Sys::new(settings);
    sys.execute(cmd)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_args_skip_program_name() {
        let args = vec!["psh".to_string(), "get".to_string(), "env".to_string()];
        assert_eq!(command_args(&args), vec!["get", "env"]);
        assert!(command_args(&["psh".to_string()]).is_empty());
        assert!(command_args(&[]).is_empty());
    }

    #[test]
    fn settings_path_default() {
        let path = settings_path(None, Some("/home/u".into()));
        assert_eq!(path, PathBuf::from("/home/u/.config/pshell/settings.yaml"));
    }

    #[test]
    fn settings_path_without_home() {
        let path = settings_path(None, None);
        assert!(path.starts_with("/tmp"));
    }

    #[test]
    fn settings_path_from_env() {
        let path = settings_path(Some("/tmp/psh.yaml".into()), Some("/home/u".into()));
        assert_eq!(path, PathBuf::from("/tmp/psh.yaml"));
    }

    #[test]
    fn log_level_falls_back_to_warn() {
        let mut s = StoreSettings::default();
        s.log_level = "debug".into();
        assert_eq!(log_level(&s), Level::DEBUG);
        s.log_level = "loud".into();
        assert_eq!(log_level(&s), Level::WARN);
    }

    #[test]
    fn execute_status() {
        let resp = execute(StoreSettings::default(), Command::Status { format: None });
        match resp {
            Response::Ok { output } => assert!(output.contains("environment: 0")),
            Response::Error { message } => panic!("expected Ok, got error: {}", message),
        }
    }
}
