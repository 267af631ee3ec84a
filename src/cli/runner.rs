//! Wires configuration, registry client, refresher and scheduler together

use crate::catalog::{CatalogRefresher, Scheduler, snapshot_channel};
use crate::cli::args::Args;
use crate::config::ListerConfig;
use crate::error::{ListerError, Result};
use crate::listing::Lister;
use crate::logging::Logger;
use crate::registry::{RealmTokenProvider, RegistryClient, StaticTokenProvider, TokenProvider};
use std::sync::Arc;

pub struct Runner {
    args: Args,
    config: ListerConfig,
    output: Logger,
}

impl Runner {
    pub fn new(args: Args) -> Result<Self> {
        args.validate()?;
        let config = args.to_config()?;

        let output = if args.quiet {
            Logger::new_quiet()
        } else {
            Logger::new(args.verbose)
        };

        Ok(Self {
            args,
            config,
            output,
        })
    }

    pub fn config(&self) -> &ListerConfig {
        &self.config
    }

    pub async fn run(&self) -> Result<()> {
        self.output.section("Registry Lister");
        self.print_configuration();

        let (publisher, reader) = snapshot_channel();
        let client = Arc::new(self.create_registry_client()?);
        let refresher = Arc::new(
            CatalogRefresher::from_config(&self.config, client, publisher)
                .with_output(self.output.clone()),
        );
        let lister = Lister::new(&self.config, reader.clone());

        if self.args.once {
            let report = refresher.refresh().await?;
            self.output.block(&lister.listing(None).render_text());
            self.output.success(&format!(
                "Listed {} public repositories in {}",
                report.snapshot.len(),
                self.output.format_duration(report.elapsed)
            ));
            return Ok(());
        }

        let handle = Scheduler::new(refresher, self.config.refresh_interval)?
            .with_output(self.output.clone())
            .start();

        let mut updates = reader;
        loop {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    self.output.info("Shutdown requested, waiting for the current refresh");
                    break;
                }
                snapshot = updates.changed() => {
                    if snapshot.is_none() {
                        break;
                    }
                    self.output.block(&lister.listing(None).render_text());
                }
            }
        }

        handle.shutdown().await?;
        self.output.info(&format!(
            "Stopped after {}",
            self.output.format_duration(self.output.elapsed())
        ));
        Ok(())
    }

    fn print_configuration(&self) {
        let prefixes = if self.config.public_prefixes.is_empty() {
            "(none - nothing will be listed)".to_string()
        } else {
            self.config.public_prefixes.join(", ")
        };

        self.output.summary_kv(
            "Configuration",
            &[
                ("Registry", self.config.base_address()),
                (
                    "Refresh interval",
                    self.output.format_duration(self.config.refresh_interval),
                ),
                ("Public prefixes", prefixes),
                (
                    "Request timeout",
                    self.output.format_duration(self.config.request_timeout),
                ),
            ],
        );

        if self.config.public_prefixes.is_empty() {
            self.output
                .warning("No public prefixes configured; every repository stays private");
        }
    }

    fn create_token_provider(&self) -> Result<Arc<dyn TokenProvider>> {
        if let Some(token) = &self.args.token {
            self.output.verbose("Using pre-issued bearer token");
            return Ok(Arc::new(StaticTokenProvider::new(token.clone())));
        }

        self.output
            .verbose("Requesting tokens from the registry's token service");
        let provider = RealmTokenProvider::new(
            &self.config.base_address(),
            self.config.request_timeout,
            self.config.skip_tls,
            self.output.clone(),
        )
        .map_err(ListerError::from)?
        .with_credentials(self.args.username.clone(), self.args.password.clone());

        Ok(Arc::new(provider))
    }

    fn create_registry_client(&self) -> Result<RegistryClient> {
        let client = RegistryClient::builder(self.config.base_address())
            .with_timeout(self.config.request_timeout)
            .with_skip_tls(self.config.skip_tls)
            .with_token_provider(self.create_token_provider()?)
            .with_output(self.output.clone())
            .build()?;
        Ok(client)
    }
}
