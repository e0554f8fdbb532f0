//! `anchore-cli system status` evaluation.

use std::collections::BTreeMap;

use chartcheck_core::config::WaitConfig;
use chartcheck_core::shell::run_command_and_get_output;
use chartcheck_core::{Attempt, ShellCommand, do_with_retry};
use regex::Regex;
use tracing::info;

use crate::EngineError;

/// Check `anchore-cli system status` output.
///
/// Each service needs a `SERVICE ... : ... up` line; a missing one is retryable.
/// Any `down` in the output is fatal.
pub fn evaluate_system_status<S: AsRef<str>>(output: &str, services: &[S]) -> Result<(), Attempt> {
    for service in services {
        let service = service.as_ref();
        let pattern = format!(".*({})+.*[:].*(up)", regex::escape(service));
        let re = Regex::new(&pattern).map_err(Attempt::fatal)?;
        if !re.is_match(output) {
            return Err(Attempt::Retry(format!("service: {service} is not ready")));
        }
        if output.contains("down") {
            return Err(Attempt::Fatal(
                "engine services reported down status".to_owned(),
            ));
        }
    }
    Ok(())
}

/// Run `anchore-cli system status` until every service reports up.
pub async fn verify_engine_system_status<S: AsRef<str>>(
    services: &[S],
    env: &BTreeMap<String, String>,
    wait: &WaitConfig,
) -> Result<String, EngineError> {
    let cmd = ShellCommand::new("anchore-cli")
        .args(["system", "status"])
        .envs(env.iter().map(|(k, v)| (k.clone(), v.clone())));

    let output = do_with_retry(
        "verify engine status",
        wait.service_retries,
        wait.sleep(),
        || async {
            let output = run_command_and_get_output(&cmd)
                .await
                .map_err(Attempt::retry)?;
            info!("system status:\n{output}");
            evaluate_system_status(&output, services)?;
            Ok(output)
        },
    )
    .await?;
    Ok(output)
}
