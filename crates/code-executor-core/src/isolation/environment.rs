//! Restricted namespace for submissions
//!
//! The namespace is produced by a small bootstrap program that the worker
//! interpreter runs before the submission. It is rendered once from the
//! policies when the executor starts and reused unchanged by every worker:
//! - `__builtins__` holds only the [`BuiltinPolicy`] names and the builtin
//!   exception types; [`DenylistPolicy`] names are never present
//! - `__import__` is replaced by a gate that checks the top-level module name
//!   against the [`AllowlistPolicy`] on every import the submission executes
//! - the outcome is written as one [`WorkerReport`](crate::protocol::WorkerReport)
//!   line to the report descriptor
//!
//! Modules loaded by an allowed module go through the regular import system.

use crate::policy::{AllowlistPolicy, BuiltinPolicy, DenylistPolicy};
use crate::protocol::{MAX_REPORT_TEXT_CHARS, REPORT_FD};
use crate::{ExecutorError, Result};

const BOOTSTRAP_TEMPLATE: &str = r#"import builtins as _b, json as _json, os as _os, sys as _sys, traceback as _tb

_PERMITTED = frozenset(@PERMITTED@)
_DENIED = frozenset(@DENIED@)
_ALLOWED = frozenset(@ALLOWED@)
_MAX_TEXT = @MAX_TEXT@
_report = _os.fdopen(@REPORT_FD@, "w", encoding="utf-8")
_real_import = _b.__import__
_exec = _b.exec
_compile = _b.compile


class ImportRejected(ImportError):
    pass


def _gated_import(name, globals=None, locals=None, fromlist=(), level=0):
    if level != 0 or name.partition(".")[0] not in _ALLOWED:
        shown = "." * level + name
        raise ImportRejected(
            "Import of '%s' is not allowed for security reasons" % shown, name=shown
        )
    return _real_import(name, globals, locals, fromlist, level)


def _namespace():
    exposed = {}
    for key, value in vars(_b).items():
        if key in _DENIED:
            continue
        if key in _PERMITTED or (
            isinstance(value, type) and issubclass(value, BaseException)
        ):
            exposed[key] = value
    exposed["__import__"] = _gated_import
    return {"__builtins__": exposed, "__name__": "__main__", "__doc__": None}


def _bounded(text):
    if len(text) <= _MAX_TEXT:
        return text
    return text[:_MAX_TEXT] + "\n... (diagnostic truncated)"


def _send(kind, **fields):
    fields = {key: _bounded(value) for key, value in fields.items()}
    fields["kind"] = kind
    _report.write(_json.dumps(fields) + "\n")
    _report.flush()


def _main():
    source = _sys.stdin.read()
    namespace = _namespace()
    try:
        _exec(_compile(source, "<submission>", "exec"), namespace)
    except ImportRejected as exc:
        _send("import_rejected", module=exc.name or "", message=str(exc))
    except MemoryError:
        _send("memory_exhausted")
    except SystemExit as exc:
        if exc.code is None or exc.code == 0:
            _send("completed")
        else:
            _send("exited", code=str(exc.code))
    except BaseException as exc:
        lines = _tb.format_exception(type(exc), exc, exc.__traceback__.tb_next)
        _send("fault", diagnostic="".join(lines))
    else:
        _send("completed")
    finally:
        for stream in (_sys.stdout, _sys.stderr):
            try:
                stream.flush()
            except Exception:
                pass


_main()
"#;

/// Renders the worker bootstrap from the policies
#[derive(Debug)]
pub struct RestrictedEnvironmentBuilder<'a> {
    allowlist: &'a AllowlistPolicy,
    denylist: DenylistPolicy,
    builtins: BuiltinPolicy,
}

impl<'a> RestrictedEnvironmentBuilder<'a> {
    pub fn new(allowlist: &'a AllowlistPolicy) -> Result<Self> {
        let denylist = DenylistPolicy::default();
        let builtins = BuiltinPolicy::new(&denylist)?;
        Ok(Self {
            allowlist,
            denylist,
            builtins,
        })
    }

    pub fn build(&self) -> Result<RestrictedEnvironment> {
        let allowed: Vec<&str> = self.allowlist.modules().collect();
        let render = |names: &[&str]| {
            serde_json::to_string(names)
                .map_err(|e| ExecutorError::Config(format!("failed to render policy: {e}")))
        };

        let bootstrap = BOOTSTRAP_TEMPLATE
            .replace("@PERMITTED@", &render(self.builtins.names())?)
            .replace("@DENIED@", &render(self.denylist.names())?)
            .replace("@ALLOWED@", &render(&allowed)?)
            .replace("@REPORT_FD@", &REPORT_FD.to_string())
            .replace("@MAX_TEXT@", &MAX_REPORT_TEXT_CHARS.to_string());

        tracing::debug!(
            allowed_modules = allowed.len(),
            permitted_builtins = self.builtins.names().len(),
            denied_builtins = self.denylist.names().len(),
            "restricted environment rendered"
        );

        Ok(RestrictedEnvironment { bootstrap })
    }
}

/// Immutable bootstrap shared by every worker of an executor
#[derive(Debug, Clone)]
pub struct RestrictedEnvironment {
    bootstrap: String,
}

impl RestrictedEnvironment {
    #[must_use]
    pub fn bootstrap(&self) -> &str {
        &self.bootstrap
    }

    /// Interpreter arguments: isolated mode, unbuffered, UTF-8, bootstrap via `-c`
    #[must_use]
    pub fn interpreter_args(&self) -> [&str; 6] {
        ["-I", "-u", "-X", "utf8", "-c", &self.bootstrap]
    }
}
