//! Scripting runtime discovery.

use crate::core::checks::RuntimeCheck;
use crate::core::error::ConfigureError;
use crate::core::platform::Platform;

use super::Prober;

/// Pick the first usable runtime candidate.
///
/// pkg-config is consulted first when it was found and the platform ships
/// `.pc` files; otherwise, or when no package matched, each candidate is
/// probed as a library with the runtime's header. Sets
/// `<NAME>_USE_PKG_CONFIG`, `HAVE_<CANDIDATE>` and `<NAME>_VERSION`.
pub fn discover_runtime(
    prober: &mut Prober,
    runtime: &RuntimeCheck,
    platform: &Platform,
) -> Result<String, ConfigureError> {
    let pkg_key = runtime.pkg_config_key();
    prober.env_mut().set(&pkg_key, "0");

    let mut found = None;
    if prober.env().has("pkg-config") == Some(true) && platform.is_posix() {
        for candidate in &runtime.candidates {
            if prober.pkg_config(candidate)? {
                prober.env_mut().set(&pkg_key, "1");
                found = Some(candidate.clone());
                break;
            }
        }
    }

    if found.is_none() {
        let headers = vec![runtime.header.clone()];
        for candidate in &runtime.candidates {
            if prober.library(candidate, &headers)? {
                found = Some(candidate.clone());
                break;
            }
        }
    }

    let Some(version) = found else {
        prober.shell().line(format_args!(
            "no suitable {} version could be found",
            runtime.name
        ));
        return Err(ConfigureError::NoRuntime {
            runtime: runtime.name.clone(),
            tried: runtime.candidates.join(", "),
        });
    };

    tracing::info!("using {} runtime {}", runtime.name, version);
    let env = prober.env_mut();
    env.have(&version, true);
    env.set(runtime.version_key(), version.as_str());
    Ok(version)
}
