//! inkpress - publish one article document from the command line

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use inkpress::{
    config::Config,
    services::{markdown::StyleRenderer, publisher::Publisher},
    theme::StyleTheme,
    wechat::{PollOutcome, StatusPoller, WeChatClient},
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkpress=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let Some(article_path) = args.next() else {
        bail!("usage: inkpress <article.md> [config.yml]");
    };
    let config_path = args.next().unwrap_or_else(|| "config.yml".to_string());

    let config = Config::load_with_env(Path::new(&config_path))?;
    config.validate()?;
    tracing::info!(config = %config_path, "configuration loaded");

    let theme = match &config.render.theme_file {
        Some(path) => StyleTheme::load(path)
            .with_context(|| format!("loading theme {}", path.display()))?,
        None => StyleTheme::builtin(),
    };

    let client = WeChatClient::new(&config.wechat, &config.publish)?;
    let renderer = StyleRenderer::new(&theme, &config.render);
    let poller = StatusPoller::new(
        Duration::from_secs(config.publish.poll_interval_secs),
        config.publish.poll_max_attempts,
    );

    let publisher = Publisher::new(client, renderer, poller);
    let outcome = publisher.publish_file(Path::new(&article_path)).await?;

    match outcome.poll {
        PollOutcome::Published { article_urls, .. } => {
            for url in &article_urls {
                tracing::info!(url = %url, "article published");
            }
            Ok(())
        }
        PollOutcome::Failed {
            description,
            fail_indexes,
            ..
        } => {
            bail!("publish failed: {description} (failed article indexes: {fail_indexes:?})")
        }
        PollOutcome::Unknown { attempts } => {
            bail!(
                "publish status still unknown after {attempts} polls; \
check publish task {} manually",
                outcome.publish_id
            )
        }
    }
}
