use serde_json::Value;

use crate::command::Command;
use crate::namespace::ParameterKind;


/// Parse CLI arguments into a typed Command enum.
///
/// The first argument is the subcommand (e.g., "set", "scope"). Two-word
/// subcommands map to their own variants ("scope push" becomes
/// `Command::ScopePush`).
///
/// Arguments are expected WITHOUT the program name (i.e., `args` should
/// be `["status"]`, not `["psh", "status"]`).
pub fn parse_args(args: &[&str]) -> Result<Command, String> {
    if args.is_empty() {
        return Err("No command specified. Run 'psh help' for usage.".into());
    }

    match args[0] {
        "status" => parse_status(args),
        "help" => parse_help(args),
        "run" => parse_run(args),
        "set" => parse_set(args),
        "get" => parse_lookup(args, false),
        "has" => parse_lookup(args, true),
        "unset" => parse_unset(args),
        "list" => parse_list(args),
        "owner" => parse_owner(args),
        "group" => parse_group(args),
        "clear-frozen" => parse_clear_frozen(args),
        "scope" => parse_scope(args),
        _ => Err(format!("Unknown command: '{}'", args[0])),
    }
}


/// Split a script line into arguments.
///
/// Whitespace separates arguments; single or double quotes group words
/// into one argument and are dropped.
pub fn split_line(line: &str) -> Result<Vec<String>, String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_arg = true;
            }
            None if c.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            None => {
                current.push(c);
                in_arg = true;
            }
        }
    }
    if let Some(q) = quote {
        return Err(format!("Unterminated {} quote", q));
    }
    if in_arg {
        args.push(current);
    }
    Ok(args)
}


// ---------------------------------------------------------------------------
// Sub-parsers
// ---------------------------------------------------------------------------

/// `psh status [--json]`
fn parse_status(args: &[&str]) -> Result<Command, String> {
    let format = if args.contains(&"--json") {
        Some("json".into())
    } else {
        None
    };
    Ok(Command::Status { format })
}

/// `psh help [topic]`
fn parse_help(args: &[&str]) -> Result<Command, String> {
    let topic = if args.len() > 1 {
        Some(args[1..].join(" "))
    } else {
        None
    };
    Ok(Command::Help { topic })
}

/// `psh run <file>`
fn parse_run(args: &[&str]) -> Result<Command, String> {
    if args.len() < 2 {
        return Err("Usage: psh run <file>".into());
    }
    Ok(Command::Run { path: args[1].into() })
}

/// `psh set <kind> <path> <value> [flags]`
fn parse_set(args: &[&str]) -> Result<Command, String> {
    if args.len() < 4 {
        return Err("Usage: psh set <kind> <path> <value> [--global] [--group <g>] [--freeze] \
                    [--read-only] [--fixed] [--transient]"
            .into());
    }
    let kind = parse_kind(args[1])?;
    let path = args[2].to_string();
    let value = parse_value(args[3]);
    let mut global = false;
    let mut group = None;
    let mut freeze = false;
    let mut read_only = false;
    let mut fixed = false;
    let mut transient = false;

    let rest = &args[4..];
    let mut i = 0;
    while i < rest.len() {
        match rest[i] {
            "--global" => global = true,
            "--group" => {
                i += 1;
                group = Some(take_arg(rest, i, "--group")?);
            }
            "--freeze" => freeze = true,
            "--read-only" => read_only = true,
            "--fixed" => fixed = true,
            "--transient" => transient = true,
            other => return Err(format!("Unknown flag for set: '{}'", other)),
        }
        i += 1;
    }
    Ok(Command::Set { kind, path, value, global, group, freeze, read_only, fixed, transient })
}

/// `psh get|has <kind> <path> [--global] [--exact] [--scope-only]`
fn parse_lookup(args: &[&str], has: bool) -> Result<Command, String> {
    if args.len() < 3 {
        return Err(format!(
            "Usage: psh {} <kind> <path> [--global] [--exact] [--scope-only]",
            args[0]
        ));
    }
    let kind = parse_kind(args[1])?;
    let path = args[2].to_string();
    let mut global = false;
    let mut exact = false;
    let mut scope_only = false;

    for flag in &args[3..] {
        match *flag {
            "--global" => global = true,
            "--exact" => exact = true,
            "--scope-only" => scope_only = true,
            other => return Err(format!("Unknown flag for {}: '{}'", args[0], other)),
        }
    }
    if has {
        Ok(Command::Has { kind, path, global, exact, scope_only })
    } else {
        Ok(Command::Get { kind, path, global, exact, scope_only })
    }
}

/// `psh unset <kind> <path> [flags]`
fn parse_unset(args: &[&str]) -> Result<Command, String> {
    if args.len() < 3 {
        return Err("Usage: psh unset <kind> <path> [--global] [--scope-only] [--force] \
                    [--group <g>] [--unfreeze]"
            .into());
    }
    let kind = parse_kind(args[1])?;
    let path = args[2].to_string();
    let mut global = false;
    let mut scope_only = false;
    let mut force = false;
    let mut group = None;
    let mut unfreeze = false;

    let rest = &args[3..];
    let mut i = 0;
    while i < rest.len() {
        match rest[i] {
            "--global" => global = true,
            "--scope-only" => scope_only = true,
            "--force" => force = true,
            "--group" => {
                i += 1;
                group = Some(take_arg(rest, i, "--group")?);
            }
            "--unfreeze" => unfreeze = true,
            other => return Err(format!("Unknown flag for unset: '{}'", other)),
        }
        i += 1;
    }
    Ok(Command::Unset { kind, path, global, scope_only, force, group, unfreeze })
}

/// `psh list <kind> [prefix] [--global] [--scope-only] [--json]`
fn parse_list(args: &[&str]) -> Result<Command, String> {
    if args.len() < 2 {
        return Err("Usage: psh list <kind> [prefix] [--global] [--scope-only] [--json]".into());
    }
    let kind = parse_kind(args[1])?;
    let mut prefix = String::new();
    let mut global = false;
    let mut scope_only = false;
    let mut format = None;

    for arg in &args[2..] {
        match *arg {
            "--global" => global = true,
            "--scope-only" => scope_only = true,
            "--json" => format = Some("json".into()),
            flag if flag.starts_with("--") => {
                return Err(format!("Unknown flag for list: '{}'", flag));
            }
            p if prefix.is_empty() => prefix = p.to_string(),
            extra => return Err(format!("Unexpected argument for list: '{}'", extra)),
        }
    }
    Ok(Command::List { kind, prefix, global, scope_only, format })
}

/// `psh owner <kind> <path>`
fn parse_owner(args: &[&str]) -> Result<Command, String> {
    if args.len() < 3 {
        return Err("Usage: psh owner <kind> <path>".into());
    }
    Ok(Command::Owner {
        kind: parse_kind(args[1])?,
        path: args[2].into(),
    })
}

/// `psh group <kind> <group>`
fn parse_group(args: &[&str]) -> Result<Command, String> {
    if args.len() < 3 {
        return Err("Usage: psh group <kind> <group>".into());
    }
    Ok(Command::GroupNodes {
        kind: parse_kind(args[1])?,
        group: args[2].into(),
    })
}

/// `psh clear-frozen <group>`
fn parse_clear_frozen(args: &[&str]) -> Result<Command, String> {
    if args.len() < 2 {
        return Err("Usage: psh clear-frozen <group>".into());
    }
    Ok(Command::GroupClear { group: args[1].into() })
}

/// `psh scope <push|pop|flush>`
fn parse_scope(args: &[&str]) -> Result<Command, String> {
    if args.len() < 2 {
        return Err("Usage: psh scope <push|pop|flush>".into());
    }
    match args[1] {
        "push" => Ok(Command::ScopePush),
        "pop" => Ok(Command::ScopePop),
        "flush" => Ok(Command::ScopeFlush),
        other => Err(format!("Unknown scope subcommand: '{}'", other)),
    }
}


// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_kind(arg: &str) -> Result<ParameterKind, String> {
    arg.parse()
}

/// Values are JSON when they parse as JSON, plain strings otherwise.
fn parse_value(arg: &str) -> Value {
    serde_json::from_str(arg).unwrap_or_else(|_| Value::String(arg.to_string()))
}

fn take_arg(args: &[&str], index: usize, flag: &str) -> Result<String, String> {
    if index >= args.len() {
        return Err(format!("{} requires a value", flag));
    }
    Ok(args[index].into())
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_args() {
        assert!(parse_args(&[]).is_err());
    }

    #[test]
    fn unknown_command() {
        assert!(parse_args(&["bogus"]).is_err());
    }

    #[test]
    fn status_json() {
        let cmd = parse_args(&["status", "--json"]).unwrap();
        assert_eq!(cmd, Command::Status { format: Some("json".into()) });
    }

    #[test]
    fn help_topic() {
        let cmd = parse_args(&["help", "set"]).unwrap();
        assert_eq!(cmd, Command::Help { topic: Some("set".into()) });
    }

    #[test]
    fn set_minimal() {
        let cmd = parse_args(&["set", "var", "a.b", "hello"]).unwrap();
        match cmd {
            Command::Set { kind, path, value, global, group, freeze, .. } => {
                assert_eq!(kind, ParameterKind::Variable);
                assert_eq!(path, "a.b");
                assert_eq!(value, json!("hello"));
                assert!(!global);
                assert!(group.is_none());
                assert!(!freeze);
            }
            other => panic!("expected Set, got {:?}", other),
        }
    }

    #[test]
    fn set_with_flags() {
        let cmd = parse_args(&[
            "set", "env", "prompt", "42", "--global", "--group", "addon", "--freeze", "--fixed",
        ])
        .unwrap();
        match cmd {
            Command::Set { value, global, group, freeze, fixed, read_only, transient, .. } => {
                assert_eq!(value, json!(42));
                assert!(global);
                assert_eq!(group.as_deref(), Some("addon"));
                assert!(freeze);
                assert!(fixed);
                assert!(!read_only);
                assert!(!transient);
            }
            other => panic!("expected Set, got {:?}", other),
        }
    }

    #[test]
    fn set_group_missing_value() {
        let err = parse_args(&["set", "env", "p", "1", "--group"]).unwrap_err();
        assert!(err.contains("--group requires a value"));
    }

    #[test]
    fn set_unknown_kind() {
        assert!(parse_args(&["set", "alias", "p", "1"]).is_err());
    }

    #[test]
    fn get_and_has() {
        let cmd = parse_args(&["get", "ctx", "debug", "--exact"]).unwrap();
        assert_eq!(
            cmd,
            Command::Get {
                kind: ParameterKind::Context,
                path: "debug".into(),
                global: false,
                exact: true,
                scope_only: false,
            }
        );
        match parse_args(&["has", "key", "k", "--global", "--scope-only"]).unwrap() {
            Command::Has { global, scope_only, .. } => {
                assert!(global);
                assert!(scope_only);
            }
            other => panic!("expected Has, got {:?}", other),
        }
    }

    #[test]
    fn unset_unfreeze() {
        let cmd = parse_args(&["unset", "env", "p", "--global", "--unfreeze", "--group", "g"]).unwrap();
        match cmd {
            Command::Unset { global, unfreeze, group, force, .. } => {
                assert!(global);
                assert!(unfreeze);
                assert!(!force);
                assert_eq!(group.as_deref(), Some("g"));
            }
            other => panic!("expected Unset, got {:?}", other),
        }
    }

    #[test]
    fn list_prefix_and_flags() {
        let cmd = parse_args(&["list", "proc", "git", "--json"]).unwrap();
        assert_eq!(
            cmd,
            Command::List {
                kind: ParameterKind::Procedure,
                prefix: "git".into(),
                global: false,
                scope_only: false,
                format: Some("json".into()),
            }
        );
        assert!(parse_args(&["list", "proc", "a", "b"]).is_err());
    }

    #[test]
    fn group_commands() {
        assert_eq!(
            parse_args(&["clear-frozen", "addon"]).unwrap(),
            Command::GroupClear { group: "addon".into() }
        );
        assert_eq!(
            parse_args(&["group", "env", "addon"]).unwrap(),
            Command::GroupNodes { kind: ParameterKind::Environment, group: "addon".into() }
        );
    }

    #[test]
    fn scope_subcommands() {
        assert_eq!(parse_args(&["scope", "push"]).unwrap(), Command::ScopePush);
        assert_eq!(parse_args(&["scope", "pop"]).unwrap(), Command::ScopePop);
        assert!(parse_args(&["scope", "jump"]).is_err());
    }

    #[test]
    fn split_line_quotes() {
        let args = split_line(r#"set proc ll "ls -l"  --global"#).unwrap();
        assert_eq!(args, vec!["set", "proc", "ll", "ls -l", "--global"]);
        assert_eq!(split_line("set var e ''").unwrap(), vec!["set", "var", "e", ""]);
        assert!(split_line("set var x 'open").is_err());
    }
}
