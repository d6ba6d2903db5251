//! Test program synthesis and compiler command lines.
//!
//! Each function here performs one uncached probe: it announces the check,
//! writes the test program to a scratch file, logs it, runs the toolchain
//! through the invoker and echoes the result. Memoization and `HAVE_*`
//! flags are handled by [`Prober`](super::Prober).

use std::path::Path;

use anyhow::Result;

use crate::util::scratch::{with_scratch, ScratchArtifact};

use super::ProbeContext;

const EMPTY_MAIN: &str = "int main(int argc, char **argv) { return 0; }\n";

/// Source of a program that includes each of `headers`.
pub fn header_program(headers: &[String]) -> String {
    let mut program = String::new();
    for header in headers {
        program.push_str(&format!("#include <{}>\n", header));
    }
    program.push_str(EMPTY_MAIN);
    program
}

/// Source of a program that exits 0 when `define` is defined.
///
/// With `run == false` the undefined branch is a compile error instead, so
/// the answer is known without executing the result.
pub fn define_program(define: &str, headers: &[String], run: bool) -> String {
    let mut program = String::from("#include <stdlib.h>\n");
    for header in headers {
        program.push_str(&format!("#include <{}>\n", header));
    }
    program.push_str("int main(int argc, char **argv) {\n");
    program.push_str(&format!("#ifdef {}\n", define));
    program.push_str("    return 0;\n");
    program.push_str("#else\n");
    if run {
        program.push_str("    return 1;\n");
    } else {
        program.push_str(&format!("#error {} is not defined\n", define));
    }
    program.push_str("#endif\n");
    program.push_str("}\n");
    program
}

fn lib_flags(libs: &[String]) -> impl Iterator<Item = String> + '_ {
    libs.iter().map(|l| format!("-l{}", l))
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

impl ProbeContext {
    fn log_program(&mut self, program: &str) {
        self.log().line(format!("test program:\n{}", program));
    }

    /// `[cc, -o, object, source]` followed by `CFLAGS`.
    fn compile_command(&self, scratch: &ScratchArtifact) -> Result<Vec<String>> {
        let mut argv = vec![
            self.cc(),
            "-o".to_string(),
            path_arg(scratch.object()),
            path_arg(scratch.source()),
        ];
        argv.extend(self.env.split_flags("CFLAGS")?);
        Ok(argv)
    }

    /// Compile the scratch program, then run it if target binaries can run
    /// here. Echoes and logs the verdict.
    fn compile_and_run(&mut self, scratch: &ScratchArtifact, argv: &[String], run: bool) -> Result<bool> {
        let mut code = self.invoker.run(argv);
        if code == 0 && run {
            match self.run_command(scratch.object())? {
                Some(cmd) => code = self.invoker.run(&cmd),
                None => self
                    .log()
                    .line("cross compiling without --cross-execute, not running test program"),
            }
        }

        if code == 0 {
            self.log().line("ok");
        } else {
            self.log().line(format!("failed with exit code {}", code));
        }
        self.shell.result(code == 0);
        Ok(code == 0)
    }

    fn scratch<T>(
        &mut self,
        kind: &str,
        name: &str,
        program: &str,
        f: impl FnOnce(&mut Self, &ScratchArtifact) -> Result<T>,
    ) -> Result<T> {
        let dir = self.scratch_dir.clone();
        let binext = self.binext();
        with_scratch(&dir, kind, name, program, &binext, |scratch| f(self, scratch))
    }
}

/// Can `cc` build a trivial program? Sets `CC` on success.
pub fn compiler(ctx: &mut ProbeContext, cc: &str) -> Result<bool> {
    ctx.shell.checking(format_args!("compiler {}", cc));
    let program = EMPTY_MAIN;
    ctx.log().line(format!("test program ({}):\n{}", cc, program));

    let ok = ctx.scratch("compiler", cc, program, |ctx, scratch| {
        let argv = vec![
            cc.to_string(),
            "-o".to_string(),
            path_arg(scratch.object()),
            path_arg(scratch.source()),
        ];
        Ok(ctx.invoker.test_call(&argv, &ctx.shell))
    })?;

    if ok {
        ctx.env.set("CC", cc);
    }
    Ok(ok)
}

/// Does a program including `header` compile?
pub fn header(ctx: &mut ProbeContext, header: &str) -> Result<bool> {
    ctx.shell.checking(format_args!("header {}", header));
    let program = header_program(&[header.to_string()]);
    ctx.log_program(&program);

    ctx.scratch("header", header, &program, |ctx, scratch| {
        let argv = ctx.compile_command(scratch)?;
        Ok(ctx.invoker.test_call(&argv, &ctx.shell))
    })
}

/// Does a program including `headers` link against `-l<name>`?
pub fn library(ctx: &mut ProbeContext, name: &str, headers: &[String]) -> Result<bool> {
    ctx.shell.checking(format_args!("library {}", name));
    let program = header_program(headers);
    ctx.log_program(&program);

    ctx.scratch("library", name, &program, |ctx, scratch| {
        let mut argv = ctx.compile_command(scratch)?;
        argv.extend(ctx.env.split_flags("LDFLAGS")?);
        argv.push(format!("-l{}", name));
        Ok(ctx.invoker.test_call(&argv, &ctx.shell))
    })
}

/// Is `define` defined after including `headers`?
///
/// When the result cannot be executed here, the compile-only program is
/// used whatever `run` says.
pub fn define(
    ctx: &mut ProbeContext,
    define: &str,
    headers: &[String],
    libs: &[String],
    run: bool,
) -> Result<bool> {
    ctx.shell.checking(format_args!("define {}", define));
    let run = run && ctx.can_run();
    let program = define_program(define, headers, run);
    ctx.log_program(&program);

    ctx.scratch("define", define, &program, |ctx, scratch| {
        let mut argv = ctx.compile_command(scratch)?;
        if !libs.is_empty() {
            argv.extend(ctx.env.split_flags("LDFLAGS")?);
            argv.extend(lib_flags(libs));
        }
        ctx.compile_and_run(scratch, &argv, run)
    })
}

/// Does the snippet at `source` (relative to the project root) compile, and
/// does the result exit 0?
///
/// A snippet that cannot be read counts as "no".
pub fn compile(ctx: &mut ProbeContext, name: &str, source: &Path, libs: &[String]) -> Result<bool> {
    ctx.shell.checking(format_args!("for {}", name));
    let path = ctx.root.join(source);
    let program = match std::fs::read_to_string(&path) {
        Ok(program) => program,
        Err(e) => {
            ctx.log()
                .line(format!("cannot read {}: {}", path.display(), e));
            ctx.shell.result(false);
            return Ok(false);
        }
    };
    ctx.log_program(&program);

    ctx.scratch("compile", name, &program, |ctx, scratch| {
        let mut argv = ctx.compile_command(scratch)?;
        if !libs.is_empty() {
            argv.extend(ctx.env.split_flags("LDFLAGS")?);
            argv.extend(lib_flags(libs));
        }
        ctx.compile_and_run(scratch, &argv, true)
    })
}

/// Does `binary args..` exit 0?
pub fn binary(ctx: &mut ProbeContext, binary: &str, args: &[String]) -> bool {
    ctx.shell.checking(format_args!("binary {}", binary));
    let mut argv = vec![binary.to_string()];
    argv.extend(args.iter().cloned());
    ctx.invoker.test_call(&argv, &ctx.shell)
}

/// Does `pkg-config --exists <package>` succeed?
pub fn pkg_config(ctx: &mut ProbeContext, package: &str) -> bool {
    ctx.shell.checking(format_args!("package {}", package));
    let argv = vec![
        "pkg-config".to_string(),
        "--exists".to_string(),
        package.to_string(),
    ];
    ctx.invoker.test_call(&argv, &ctx.shell)
}
