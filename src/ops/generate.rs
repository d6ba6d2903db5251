//! Generated files.
//!
//! Every generated file `<target>` is rendered from `<target>.in` in two
//! passes. `@KEY@` placeholders are replaced with environment values first;
//! an unknown key is an error. The result is then rendered as a Handlebars
//! template with the context `{ env, args }`, where `env` is the
//! environment map and `args` the configure options.

use std::path::{Path, PathBuf};

use handlebars::Handlebars;
use regex::Regex;

use crate::core::env::EnvMap;
use crate::core::error::ConfigureError;
use crate::util::fs::{read_to_string, write_atomic};
use crate::util::shell::Shell;

/// Template extension appended to a target's file name.
pub const TEMPLATE_EXT: &str = "in";

/// Path of the template that renders to `target`.
pub fn template_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".");
    name.push(TEMPLATE_EXT);
    PathBuf::from(name)
}

/// Replace `@KEY@` placeholders with values from `env`.
pub fn substitute(template: &str, env: &EnvMap, path: &Path) -> Result<String, ConfigureError> {
    let re = Regex::new(r"@([A-Za-z0-9_]+)@").map_err(anyhow::Error::from)?;

    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in re.captures_iter(template) {
        let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = env.get(key.as_str()).ok_or_else(|| ConfigureError::Template {
            path: path.to_path_buf(),
            message: format!("unknown key @{}@", key.as_str()),
        })?;
        out.push_str(&template[last..whole.start()]);
        out.push_str(value);
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

/// Render a template: placeholder substitution, then Handlebars.
pub fn render(
    template: &str,
    env: &EnvMap,
    args: &serde_json::Value,
    path: &Path,
) -> Result<String, ConfigureError> {
    let substituted = substitute(template, env, path)?;

    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(true);
    handlebars.register_escape_fn(handlebars::no_escape);

    let context = serde_json::json!({
        "env": env,
        "args": args,
    });
    handlebars
        .render_template(&substituted, &context)
        .map_err(|e| ConfigureError::Template {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

fn render_target(
    root: &Path,
    target: &Path,
    env: &EnvMap,
    args: &serde_json::Value,
    shell: &Shell,
) -> Result<String, ConfigureError> {
    shell.echo(format_args!("generating {}... ", target.display()));
    let template = template_path(target);
    let contents = read_to_string(&root.join(&template))?;
    let output = render(&contents, env, args, &template)?;
    shell.line("done");
    Ok(output)
}

/// Render `root/<target>.in` to `root/<target>` for every target.
///
/// Every template is rendered before the first file is written, so a
/// failing template leaves all targets untouched.
pub fn generate_files<'a>(
    root: &Path,
    targets: impl IntoIterator<Item = &'a Path>,
    env: &EnvMap,
    args: &serde_json::Value,
    shell: &Shell,
) -> Result<Vec<PathBuf>, ConfigureError> {
    let mut rendered = Vec::new();
    for target in targets {
        let output = render_target(root, target, env, args, shell)?;
        rendered.push((root.join(target), output));
    }

    let mut written = Vec::with_capacity(rendered.len());
    for (dest, output) in rendered {
        write_atomic(&dest, output.as_bytes())?;
        tracing::debug!("wrote {}", dest.display());
        written.push(dest);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn env() -> EnvMap {
        let mut env = EnvMap::new();
        env.set("HAVE_STDIO_H", "1");
        env.set("PLATFORM", "linux");
        env.set("LUA_VERSION", "lua5.3");
        env
    }

    #[test]
    fn test_template_path() {
        assert_eq!(template_path(Path::new("Makefile")), PathBuf::from("Makefile.in"));
        assert_eq!(
            template_path(Path::new("include/dmr/config.h")),
            PathBuf::from("include/dmr/config.h.in")
        );
    }

    #[test]
    fn test_substitute() {
        let out = substitute(
            "#define HAVE_STDIO_H @HAVE_STDIO_H@\n# mail me@example.com\n",
            &env(),
            Path::new("config.h.in"),
        )
        .unwrap();
        assert_eq!(out, "#define HAVE_STDIO_H 1\n# mail me@example.com\n");
    }

    #[test]
    fn test_unknown_placeholder_is_error() {
        let err = substitute("x = @NOPE@\n", &env(), Path::new("config.h.in")).unwrap_err();
        match err {
            ConfigureError::Template { path, message } => {
                assert_eq!(path, Path::new("config.h.in"));
                assert!(message.contains("@NOPE@"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_render_handlebars_context() {
        let args = json!({ "prefix": "/usr/local", "with_debug": true });
        let out = render(
            "PREFIX = {{args.prefix}}\nLUA = {{env.LUA_VERSION}}\n{{#if args.with_debug}}CFLAGS += -g\n{{/if}}CC = \"@PLATFORM@\"\n",
            &env(),
            &args,
            Path::new("Makefile.in"),
        )
        .unwrap();
        assert_eq!(
            out,
            "PREFIX = /usr/local\nLUA = lua5.3\nCFLAGS += -g\nCC = \"linux\"\n"
        );
    }

    #[test]
    fn test_render_missing_variable_is_error() {
        let err = render("{{env.NOPE}}", &env(), &json!({}), Path::new("Makefile.in")).unwrap_err();
        assert!(matches!(err, ConfigureError::Template { .. }));
    }

    #[test]
    fn test_generate_files() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("include")).unwrap();
        std::fs::write(
            tmp.path().join("include/config.h.in"),
            "#define HAVE_STDIO_H @HAVE_STDIO_H@\n",
        )
        .unwrap();
        let shell = Shell::buffered();

        let written = generate_files(
            tmp.path(),
            [Path::new("include/config.h")],
            &env(),
            &json!({}),
            &shell,
        )
        .unwrap();

        assert_eq!(written, vec![tmp.path().join("include/config.h")]);
        assert_eq!(std::fs::read_to_string(&written[0]).unwrap(), "#define HAVE_STDIO_H 1\n");
        assert_eq!(shell.captured(), "generating include/config.h... done\n");
    }

    #[test]
    fn test_missing_template_is_error() {
        let tmp = TempDir::new().unwrap();
        let result = generate_files(
            tmp.path(),
            [Path::new("Makefile")],
            &env(),
            &json!({}),
            &Shell::buffered(),
        );
        assert!(result.is_err());
        assert!(!tmp.path().join("Makefile").exists());
    }

    #[test]
    fn test_failing_template_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("config.h.in"), "#define HAVE_STDIO_H @HAVE_STDIO_H@\n").unwrap();
        std::fs::write(tmp.path().join("Makefile.in"), "CC = @NOPE@\n").unwrap();
        let shell = Shell::buffered();

        let err = generate_files(
            tmp.path(),
            [Path::new("config.h"), Path::new("Makefile")],
            &env(),
            &json!({}),
            &shell,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigureError::Template { .. }));
        assert!(!tmp.path().join("config.h").exists());
        assert!(!tmp.path().join("Makefile").exists());
        assert_eq!(shell.captured(), "generating config.h... done\ngenerating Makefile... ");
    }
}
