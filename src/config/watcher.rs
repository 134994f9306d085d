//! Configuration file watcher for hot reload.
//!
//! The parent directory is watched rather than the file itself: editors
//! that save by writing a new file and renaming it over the old one would
//! otherwise end the watch after the first save.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::HostsConfig;

/// Watches one hosting configuration file.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<HostsConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for configurations that loaded
    /// and validated.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<HostsConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching in notify's background thread.
    ///
    /// A broken edit is logged and dropped so the current registry stays
    /// in place. The returned watcher must be kept alive for as long as
    /// updates are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();
        let directory = watched_directory(&self.path);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if concerns(&event, &path) => {
                    tracing::info!(path = %path.display(), kind = ?event.kind, "Hosting config change detected");
                    match load_config(&path) {
                        Ok(config) => {
                            if tx.send(config).is_err() {
                                tracing::debug!("Config update receiver gone; update dropped");
                            }
                        }
                        Err(e) => tracing::error!(
                            path = %path.display(),
                            error = %e,
                            "Changed hosting config does not load; keeping current configuration"
                        ),
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&directory, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %self.path.display(), "Hosting config watcher started");
        Ok(watcher)
    }
}

fn watched_directory(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Whether `event` creates or modifies the file at `path`.
fn concerns(event: &Event, path: &Path) -> bool {
    let relevant_kind = matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_));
    relevant_kind && event.paths.iter().any(|p| p.file_name() == path.file_name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    #[test]
    fn test_watched_directory() {
        assert_eq!(watched_directory(Path::new("hosts.toml")), PathBuf::from("."));
        assert_eq!(watched_directory(Path::new("/etc/hosting/hosts.toml")), PathBuf::from("/etc/hosting"));
    }

    #[test]
    fn test_concerns_only_the_config_file() {
        let path = Path::new("/etc/hosting/hosts.toml");
        let event = |kind, file: &str| Event::new(kind).add_path(PathBuf::from(file));

        assert!(concerns(&event(EventKind::Modify(ModifyKind::Any), "/etc/hosting/hosts.toml"), path));
        assert!(concerns(&event(EventKind::Create(CreateKind::File), "/etc/hosting/hosts.toml"), path));
        assert!(!concerns(&event(EventKind::Modify(ModifyKind::Any), "/etc/hosting/other.toml"), path));
        assert!(!concerns(&event(EventKind::Remove(RemoveKind::File), "/etc/hosting/hosts.toml"), path));
    }
}
