//! TCP listener and router assembly

use std::sync::Arc;

use anyhow::{Context, Result};
use decoysh::{
    AuditSink, EnsembleArbiter, JsonlAuditLog, Router, ScenarioLocator, Simulation,
    SimulationBackend,
};
use tokio::net::TcpListener;

use crate::auth::AuthGate;
use crate::config::{BackendSection, ServerConfig};
use crate::shell::Shell;

/// Build the simulation layer named by `[llm]`.
pub fn simulation(config: &ServerConfig) -> Result<Simulation> {
    let llm = &config.llm;
    let simulation = match (&llm.primary, &llm.secondary, llm.ensemble) {
        (Some(primary), Some(secondary), true) => {
            let arbiter = EnsembleArbiter::new(backend(primary)?, backend(secondary)?);
            Simulation::Ensemble(Arc::new(arbiter))
        }
        (Some(primary), _, _) => Simulation::Single(backend(primary)?),
        (None, _, _) => Simulation::Disabled,
    };
    Ok(simulation)
}

fn backend(section: &BackendSection) -> Result<Arc<dyn SimulationBackend>> {
    let backend = decoysh_llm::create_backend(&section.kind, section.model.as_deref())
        .with_context(|| format!("creating {} backend", section.kind))?;
    Ok(Arc::new(backend))
}

/// Assemble the shared per-connection state.
pub fn build_shell(config: &ServerConfig) -> Result<Shell> {
    let router = Router::new(ScenarioLocator::new(&config.paths.scenarios_root))
        .with_limits(config.limits.to_limits())
        .with_simulation(simulation(config)?);
    let audit: Arc<dyn AuditSink> = Arc::new(JsonlAuditLog::new(&config.paths.events_file));

    Ok(Shell {
        router: Arc::new(router),
        audit,
        auth: AuthGate::from_config(&config.auth),
        banner: config.server.banner.clone(),
        scenario: config.server.scenario.clone(),
        tty_dir: config.paths.tty_dir.clone(),
    })
}

/// Listen until Ctrl+C.
pub async fn run(config: ServerConfig) -> Result<()> {
    for dir in [&config.paths.logs_dir, &config.paths.tty_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
    }

    let shell = Arc::new(build_shell(&config)?);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        scenario = %config.server.scenario,
        simulation = ?shell.router.simulation(),
        "listening"
    );

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                let shell = shell.clone();
                tokio::spawn(async move {
                    let (reader, writer) = stream.into_split();
                    shell.handle(reader, writer, peer).await;
                });
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_llm_is_disabled() {
        let config = ServerConfig::parse("").unwrap();
        assert!(matches!(simulation(&config).unwrap(), Simulation::Disabled));
    }

    #[test]
    fn test_unknown_backend_kind_fails() {
        let config = ServerConfig::parse("[llm]\nprimary = { kind = \"llama\" }\n").unwrap();
        let err = simulation(&config).unwrap_err();
        assert!(format!("{:#}", err).contains("creating llama backend"));
    }

    #[test]
    fn test_build_shell_uses_config() {
        let config = ServerConfig::parse(
            "[server]\nbanner = \"Ubuntu\"\nscenario = \"camera\"\n[limits]\nmax_output_bytes = 128\n",
        )
        .unwrap();
        let shell = build_shell(&config).unwrap();
        assert_eq!(shell.banner, "Ubuntu");
        assert_eq!(shell.scenario, "camera");
        assert_eq!(shell.router.limits().max_output, 128);
    }
}
