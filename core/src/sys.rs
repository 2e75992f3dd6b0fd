use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};

use crate::cli::{parse_args, split_line};
use crate::command::Command;
use crate::help::help_text;
use crate::namespace::{
    GroupId, LookupOptions, Parameter, ParameterContainer, ParameterInput, ParameterKind,
    SetOptions, StoreError, UnsetOptions,
};
use crate::types::config::StoreSettings;
use crate::types::protocol::Response;


/// Central runtime for `psh`. Owns the parameter container and dispatches
/// commands against it.
pub struct Sys {
    container: ParameterContainer,
    settings: StoreSettings,
}


impl Sys {
    pub fn new(settings: StoreSettings) -> Sys {
        let container = ParameterContainer::new(&settings);
        Sys { container, settings }
    }

    pub fn container(&self) -> &ParameterContainer {
        &self.container
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    /// Execute a typed command and return the response.
    pub fn execute(&mut self, cmd: Command) -> Response {
        debug!(command = ?cmd, "execute");
        match cmd {
            Command::Status { format } => self.cmd_status(format),
            Command::Help { topic } => Response::Ok {
                output: help_text(topic.as_deref()),
            },
            Command::Run { path } => self.run_script(Path::new(&path)),
            Command::Set { kind, path, value, global, group, freeze, read_only, fixed, transient } => {
                let flags = SetFlags { read_only, fixed, transient };
                self.cmd_set(kind, path, value, global, group, freeze, flags)
            }
            Command::Get { kind, path, global, exact, scope_only } => {
                self.cmd_get(kind, path, lookup(global, exact, scope_only))
            }
            Command::Has { kind, path, global, exact, scope_only } => {
                self.cmd_has(kind, path, lookup(global, exact, scope_only))
            }
            Command::Unset { kind, path, global, scope_only, force, group, unfreeze } => {
                let mut options = if global { UnsetOptions::global() } else { UnsetOptions::local() };
                options.explore_other_scope = !scope_only;
                options.force = force;
                options.unfreeze = unfreeze;
                options.origin_group = group.map(GroupId::from);
                self.cmd_unset(kind, path, options)
            }
            Command::List { kind, prefix, global, scope_only, format } => {
                self.cmd_list(kind, prefix, global, scope_only, format)
            }
            Command::Owner { kind, path } => self.cmd_owner(kind, path),
            Command::GroupNodes { kind, group } => self.cmd_group_nodes(kind, group),
            Command::GroupClear { group } => self.cmd_group_clear(group),
            Command::ScopePush => Response::Ok {
                output: format!("frame {}", self.container.push_frame()),
            },
            Command::ScopePop => match self.container.pop_frame() {
                Ok(depth) => Response::Ok { output: format!("frame {}", depth) },
                Err(e) => store_error(e),
            },
            Command::ScopeFlush => Response::Ok {
                output: format!("flushed {}", self.container.flush()),
            },
        }
    }

    /// Parse one line of arguments and execute it.
    pub fn execute_line(&mut self, line: &str) -> Response {
        let args = match split_line(line) {
            Ok(args) => args,
            Err(message) => return Response::Error { message },
        };
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        match parse_args(&refs) {
            Ok(cmd) => self.execute(cmd),
            Err(message) => Response::Error { message },
        }
    }

    /// Execute a script file one command per line.
    ///
    /// Blank lines and `#` comments are skipped. Execution stops at the first
    /// failing line; the error names its line number. Scripts cannot `run`
    /// other scripts.
    pub fn run_script(&mut self, path: &Path) -> Response {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                return Response::Error {
                    message: format!("Cannot read {}: {}", path.display(), e),
                }
            }
        };
        info!(script = %path.display(), "running script");
        self.run_lines(&content)
    }

    fn run_lines(&mut self, content: &str) -> Response {
        let mut outputs = Vec::new();
        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line_no = index + 1;
            if line.split_whitespace().next() == Some("run") {
                return Response::Error {
                    message: format!("line {}: scripts cannot run other scripts", line_no),
                };
            }
            match self.execute_line(line) {
                Response::Ok { output } => {
                    if !output.is_empty() {
                        outputs.push(output);
                    }
                }
                Response::Error { message } => {
                    return Response::Error {
                        message: format!("line {}: {}", line_no, message),
                    }
                }
            }
        }
        Response::Ok { output: outputs.join("\n") }
    }

    // -------------------------------------------------------------------
    // Command handlers
    // -------------------------------------------------------------------

    fn cmd_status(&self, format: Option<String>) -> Response {
        let counts: Vec<(&'static str, usize)> = self
            .container
            .managers()
            .iter()
            .map(|m| (m.name(), m.node_count()))
            .collect();
        let depth = self.container.registry().depth();
        if format.as_deref() == Some("json") {
            let mut obj = serde_json::Map::new();
            for (name, count) in &counts {
                obj.insert(name.to_string(), Value::from(*count));
            }
            obj.insert("frame".into(), Value::from(depth));
            obj.insert(
                "default_group".into(),
                Value::from(self.settings.default_group.clone()),
            );
            Response::Ok {
                output: serde_json::to_string_pretty(&Value::Object(obj))
                    .unwrap_or_else(|_| "{}".into()),
            }
        } else {
            let parts: Vec<String> = counts
                .iter()
                .map(|(name, count)| format!("{}: {}", name, count))
                .collect();
            Response::Ok {
                output: format!("{}, frame: {}", parts.join(", "), depth),
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn cmd_set(
        &self,
        kind: ParameterKind,
        path: String,
        value: Value,
        global: bool,
        group: Option<String>,
        freeze: bool,
        flags: SetFlags,
    ) -> Response {
        let input = if flags.is_plain() {
            ParameterInput::Raw(value)
        } else {
            let mut param = Parameter::new(kind, value)
                .with_read_only(flags.read_only)
                .with_removable(!flags.fixed);
            if flags.transient {
                param = param.with_transient(true);
            }
            ParameterInput::Param(param)
        };
        let mut options = if global { SetOptions::global() } else { SetOptions::local() };
        options.origin_group = group.map(GroupId::from);
        options.freeze = freeze;

        match self.container.manager(kind).set(&path, input, options) {
            Ok(param) => Response::Ok { output: render(param.value()) },
            Err(e) => store_error(e),
        }
    }

    fn cmd_get(&self, kind: ParameterKind, path: String, options: LookupOptions) -> Response {
        match self.container.manager(kind).get(&path, options) {
            Ok(Some(param)) => Response::Ok { output: render(param.value()) },
            Ok(None) => Response::Error {
                message: format!("Nothing stored at '{}'", path),
            },
            Err(e) => store_error(e),
        }
    }

    fn cmd_has(&self, kind: ParameterKind, path: String, options: LookupOptions) -> Response {
        match self.container.manager(kind).has(&path, options) {
            Ok(found) => Response::Ok { output: found.to_string() },
            Err(e) => store_error(e),
        }
    }

    fn cmd_unset(&self, kind: ParameterKind, path: String, options: UnsetOptions) -> Response {
        match self.container.manager(kind).unset(&path, options) {
            Ok(Some(param)) => Response::Ok { output: render(param.value()) },
            Ok(None) => Response::Ok { output: String::new() },
            Err(e) => store_error(e),
        }
    }

    fn cmd_list(
        &self,
        kind: ParameterKind,
        prefix: String,
        global: bool,
        scope_only: bool,
        format: Option<String>,
    ) -> Response {
        let entries = match self.container.manager(kind).dictionary(&prefix, !global, !scope_only) {
            Ok(entries) => entries,
            Err(e) => return store_error(e),
        };
        if format.as_deref() == Some("json") {
            let obj: serde_json::Map<String, Value> = entries
                .into_iter()
                .map(|(path, param)| (path, param.into_value()))
                .collect();
            return Response::Ok {
                output: serde_json::to_string_pretty(&Value::Object(obj))
                    .unwrap_or_else(|_| "{}".into()),
            };
        }
        let lines: Vec<String> = entries
            .iter()
            .map(|(path, param)| format!("{} = {}", path, render(param.value())))
            .collect();
        Response::Ok { output: lines.join("\n") }
    }

    fn cmd_owner(&self, kind: ParameterKind, path: String) -> Response {
        match self.container.manager(kind).owner(&path) {
            Ok(Some(group)) => Response::Ok { output: group.to_string() },
            Ok(None) => Response::Error {
                message: format!("No group owns '{}'", path),
            },
            Err(e) => store_error(e),
        }
    }

    fn cmd_group_nodes(&self, kind: ParameterKind, group: String) -> Response {
        let paths = self.container.manager(kind).group_nodes(&GroupId::from(group));
        let lines: Vec<String> = paths.iter().map(|p| p.to_dotted()).collect();
        Response::Ok { output: lines.join("\n") }
    }

    fn cmd_group_clear(&self, group: String) -> Response {
        match self.container.clear_frozen(&GroupId::from(group)) {
            Ok(released) => Response::Ok { output: format!("released {}", released) },
            Err(e) => store_error(e),
        }
    }
}


/// Capability flags of `set`, gathered to keep the handler signature short.
#[derive(Debug, Clone, Copy)]
struct SetFlags {
    read_only: bool,
    fixed: bool,
    transient: bool,
}

impl SetFlags {
    fn is_plain(&self) -> bool {
        !self.read_only && !self.fixed && !self.transient
    }
}


fn lookup(global: bool, exact: bool, scope_only: bool) -> LookupOptions {
    let mut options = if global { LookupOptions::global() } else { LookupOptions::local() };
    options.perfect_match = exact;
    options.explore_other_scope = !scope_only;
    options
}

/// Strings print bare, everything else as compact JSON.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn store_error(e: StoreError) -> Response {
    Response::Error {
        message: format!("{}: {}", e.code(), e),
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sys() -> Sys {
        Sys::new(StoreSettings::default())
    }

    fn ok(resp: Response) -> String {
        match resp {
            Response::Ok { output } => output,
            Response::Error { message } => panic!("expected Ok, got error: {}", message),
        }
    }

    fn err(resp: Response) -> String {
        match resp {
            Response::Error { message } => message,
            Response::Ok { output } => panic!("expected Error, got output: {}", output),
        }
    }

    #[test]
    fn set_then_get_local() {
        let mut s = sys();
        assert_eq!(ok(s.execute_line("set var greeting hello")), "hello");
        assert_eq!(ok(s.execute_line("get var greeting")), "hello");
        assert_eq!(ok(s.execute_line("has var greeting --global --scope-only")), "false");
    }

    #[test]
    fn json_values_round_trip() {
        let mut s = sys();
        ok(s.execute_line(r#"set ctx limits '{"depth": 3}' --global"#));
        assert_eq!(ok(s.execute_line("get ctx limits --global")), r#"{"depth":3}"#);
    }

    #[test]
    fn abbreviation_and_ambiguity() {
        let mut s = sys();
        ok(s.execute_line("set env shell.prompt '> '"));
        ok(s.execute_line("set env shell.prefix x"));
        assert_eq!(ok(s.execute_line("get env sh.prom")), "> ");
        let message = err(s.execute_line("get env sh.pr"));
        assert!(message.starts_with("ambiguous_path"), "{}", message);
    }

    #[test]
    fn get_missing_is_error() {
        let mut s = sys();
        assert!(err(s.execute_line("get var nope")).contains("nope"));
    }

    #[test]
    fn fixed_values_need_force() {
        let mut s = sys();
        ok(s.execute_line("set var v 1 --fixed"));
        assert!(err(s.execute_line("unset var v")).starts_with("not_removable"));
        assert_eq!(ok(s.execute_line("unset var v --force")), "1");
    }

    #[test]
    fn freeze_and_release() {
        let mut s = sys();
        ok(s.execute_line("set env theme dark --global --group shell --freeze"));
        assert_eq!(ok(s.execute_line("owner env theme")), "shell");
        ok(s.execute_line("unset env theme --global --group shell"));
        assert_eq!(ok(s.execute_line("group env shell")), "theme");
        assert_eq!(ok(s.execute_line("clear-frozen shell")), "released 1");
        assert_eq!(ok(s.execute_line("group env shell")), "");
    }

    #[test]
    fn unauthorized_group_refused() {
        let mut s = sys();
        let message = err(s.execute_line("set env x 1 --global --group stranger"));
        assert!(message.starts_with("unauthorized"), "{}", message);
    }

    #[test]
    fn list_sorted_with_prefix() {
        let mut s = sys();
        ok(s.execute_line("set proc git.st 'git status'"));
        ok(s.execute_line("set proc git.co 'git checkout'"));
        ok(s.execute_line("set proc ll 'ls -l'"));
        assert_eq!(
            ok(s.execute_line("list proc git")),
            "git.co = git checkout\ngit.st = git status"
        );
        assert_eq!(ok(s.execute_line("list proc gi")), ok(s.execute_line("list proc git")));
    }

    #[test]
    fn scope_pop_underflow() {
        let mut s = sys();
        assert_eq!(ok(s.execute_line("scope push")), "frame 1");
        assert_eq!(ok(s.execute_line("scope pop")), "frame 0");
        assert!(err(s.execute_line("scope pop")).starts_with("scope_underflow"));
    }

    #[test]
    fn status_counts() {
        let mut s = sys();
        ok(s.execute_line("set var a 1"));
        let line = ok(s.execute(Command::Status { format: None }));
        assert!(line.contains("variable: 1"), "{}", line);
        assert!(line.ends_with("frame: 0"));
    }

    #[test]
    fn script_runs_and_reports_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# setup").unwrap();
        writeln!(file, "set var a 1").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "get var a").unwrap();
        writeln!(file, "get var missing").unwrap();

        let mut s = sys();
        let message = err(s.run_script(file.path()));
        assert!(message.starts_with("line 5:"), "{}", message);
        assert_eq!(ok(s.execute_line("get var a")), "1");
    }

    #[test]
    fn script_cannot_nest() {
        let mut s = sys();
        let message = err(s.run_lines("run other.psh"));
        assert!(message.contains("cannot run"));
    }

    #[test]
    fn unknown_command_line() {
        let mut s = sys();
        assert!(err(s.execute_line("frobnicate")).starts_with("Unknown command"));
    }
}
