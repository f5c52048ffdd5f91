//! Delivery of finished images from the capture directory.

use crate::controller::Controller;
use crate::error::{PicamError, Result};
use crate::events::PicamEvent;
use crate::gateway::MessagingGateway;
use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Suffix of files picked up for delivery
pub const IMAGE_EXTENSION: &str = ".jpg";

pub struct ImageWatcher {
    controller: Arc<Controller>,
    gateway: Arc<dyn MessagingGateway>,
    image_dir: PathBuf,
}

impl ImageWatcher {
    pub fn new(controller: Arc<Controller>, gateway: Arc<dyn MessagingGateway>) -> Self {
        let image_dir = controller.config().general.image_dir.clone();
        Self {
            controller,
            gateway,
            image_dir,
        }
    }

    /// Create the image directory, wiping leftovers first when images are
    /// deleted after sending
    pub fn prepare_dir(&self) -> Result<()> {
        if self.controller.config().general.delete_images && self.image_dir.exists() {
            info!("Purging image directory {}", self.image_dir.display());
            fs::remove_dir_all(&self.image_dir)?;
        }
        fs::create_dir_all(&self.image_dir)?;
        Ok(())
    }

    /// Watch the image directory until cancelled
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        self.prepare_dir()?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            NotifyConfig::default(),
        )?;
        watcher.watch(&self.image_dir, RecursiveMode::NonRecursive)?;
        info!("Watching {} for new images", self.image_dir.display());

        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                received = rx.recv() => received,
            };

            match received {
                Some(Ok(event)) => {
                    if let Some(path) = finalized_path(&event) {
                        self.handle_file(path).await;
                    }
                }
                Some(Err(e)) => warn!("Watch error: {:?}", e),
                None => {
                    return Err(PicamError::component(
                        "watcher",
                        "notification channel closed",
                    ))
                }
            }
        }

        debug!("Image watcher stopped");
        Ok(())
    }

    /// Deliver one finished file if armed, then apply the delete policy
    pub async fn handle_file(&self, path: &Path) {
        if !is_image(path) {
            debug!("Ignoring non-image file {}", path.display());
            return;
        }

        if self.controller.is_armed() {
            let caption = path.display().to_string();
            let mut recipients = 0;
            for owner in &self.controller.config().telegram.owner_ids {
                match self.gateway.send_document(*owner, path, &caption).await {
                    Ok(()) => recipients += 1,
                    Err(e) => warn!(
                        "Could not send image {} to user {}: {}",
                        path.display(),
                        owner,
                        e
                    ),
                }
            }
            self.controller
                .event_bus()
                .publish(PicamEvent::ImageDelivered {
                    path: path.to_path_buf(),
                    recipients,
                });
        } else {
            debug!("Not armed, not sending {}", path.display());
        }

        if self.controller.config().general.delete_images {
            match fs::remove_file(path) {
                Ok(()) => debug!("Deleted {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to delete {}: {}", path.display(), e),
            }
        }
    }
}

/// The file a notification reports as finished, if any.
///
/// Only close-after-write and rename-into-directory count. A rename inside
/// the directory is also reported as `RenameMode::Both`, which is skipped so
/// the file is seen once.
pub fn finalized_path(event: &Event) -> Option<&Path> {
    match event.kind {
        EventKind::Access(AccessKind::Close(AccessMode::Write))
        | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.first().map(PathBuf::as_path)
        }
        _ => None,
    }
}

/// Case-sensitive suffix match
pub fn is_image(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().ends_with(IMAGE_EXTENSION))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PicamConfig;
    use crate::devices::CaptureLed;
    use crate::events::EventBus;
    use crate::gateway::recording::{RecordingGateway, Sent};
    use notify::event::CreateKind;
    use std::time::Duration;
    use tempfile::TempDir;

    const OWNERS: [i64; 2] = [1, 2];

    fn setup(dir: &TempDir, armed: bool, delete: bool) -> (ImageWatcher, Arc<RecordingGateway>) {
        let mut config = PicamConfig::default();
        config.telegram.owner_ids = OWNERS.to_vec();
        config.pir.enable = true;
        config.pir.gpio = Some(17);
        config.general.arm = armed;
        config.general.delete_images = delete;
        config.general.image_dir = dir.path().join("images");

        let controller = Arc::new(Controller::new(
            Arc::new(config),
            CaptureLed::absent(),
            None,
            Arc::new(EventBus::default()),
        ));
        let gateway = Arc::new(RecordingGateway::new());
        let watcher = ImageWatcher::new(controller, gateway.clone() as Arc<dyn MessagingGateway>);
        (watcher, gateway)
    }

    fn image(watcher: &ImageWatcher, name: &str) -> PathBuf {
        let path = watcher.image_dir.join(name);
        fs::write(&path, b"jpeg").unwrap();
        path
    }

    #[test]
    fn test_classification() {
        let closed = Event::new(EventKind::Access(AccessKind::Close(AccessMode::Write)))
            .add_path(PathBuf::from("/img/a.jpg"));
        assert_eq!(finalized_path(&closed), Some(Path::new("/img/a.jpg")));

        let moved_in = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To)))
            .add_path(PathBuf::from("/img/b.jpg"));
        assert_eq!(finalized_path(&moved_in), Some(Path::new("/img/b.jpg")));

        // the paired notification for the same rename
        let renamed = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/img/b.jpg~"))
            .add_path(PathBuf::from("/img/b.jpg"));
        assert_eq!(finalized_path(&renamed), None);

        let moved_out = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::From)))
            .add_path(PathBuf::from("/img/b.jpg"));
        assert_eq!(finalized_path(&moved_out), None);

        let created = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/img/c.jpg"));
        assert_eq!(finalized_path(&created), None);

        assert!(is_image(Path::new("/img/a.jpg")));
        assert!(!is_image(Path::new("/img/a.JPG")));
        assert!(!is_image(Path::new("/img/a.jpg.tmp")));
    }

    #[test]
    fn test_prepare_dir_purges_backlog() {
        let dir = TempDir::new().unwrap();
        let (watcher, _) = setup(&dir, false, true);
        fs::create_dir_all(&watcher.image_dir).unwrap();
        let stale = image(&watcher, "old.jpg");

        watcher.prepare_dir().unwrap();

        assert!(watcher.image_dir.is_dir());
        assert!(!stale.exists());
    }

    #[tokio::test]
    async fn test_armed_image_goes_to_every_owner() {
        let dir = TempDir::new().unwrap();
        let (watcher, gateway) = setup(&dir, true, true);
        watcher.prepare_dir().unwrap();
        gateway.fail_for(OWNERS[0]);
        let path = image(&watcher, "motion.jpg");

        watcher.handle_file(&path).await;

        assert_eq!(
            gateway.sent(),
            vec![Sent::Document {
                chat_id: OWNERS[1],
                path: path.clone(),
                caption: path.display().to_string(),
            }]
        );
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_disarmed_image_is_deleted_not_sent() {
        let dir = TempDir::new().unwrap();
        let (watcher, gateway) = setup(&dir, false, true);
        watcher.prepare_dir().unwrap();
        let path = image(&watcher, "motion.jpg");

        watcher.handle_file(&path).await;

        assert!(gateway.sent().is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_non_images_are_left_alone() {
        let dir = TempDir::new().unwrap();
        let (watcher, gateway) = setup(&dir, true, true);
        watcher.prepare_dir().unwrap();
        let path = image(&watcher, "motion.avi");

        watcher.handle_file(&path).await;

        assert!(gateway.sent().is_empty());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_kept_when_delete_disabled() {
        let dir = TempDir::new().unwrap();
        let (watcher, gateway) = setup(&dir, true, false);
        watcher.prepare_dir().unwrap();
        let path = image(&watcher, "motion.jpg");

        watcher.handle_file(&path).await;

        assert_eq!(gateway.sent().len(), 2);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_run_picks_up_written_files() {
        let dir = TempDir::new().unwrap();
        let (watcher, gateway) = setup(&dir, true, true);
        let image_dir = watcher.image_dir.clone();

        let cancel = CancellationToken::new();
        let worker = tokio::spawn(watcher.run(cancel.clone()));
        tokio::time::sleep(Duration::from_millis(200)).await;

        let path = image_dir.join("live.jpg");
        fs::write(&path, b"jpeg").unwrap();

        for _ in 0..50 {
            if gateway.sent().len() == OWNERS.len() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        cancel.cancel();
        worker.await.unwrap().unwrap();

        assert_eq!(gateway.sent().len(), OWNERS.len());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_run_sends_renamed_file_once() {
        let dir = TempDir::new().unwrap();
        let (watcher, gateway) = setup(&dir, true, false);
        let image_dir = watcher.image_dir.clone();

        let cancel = CancellationToken::new();
        let worker = tokio::spawn(watcher.run(cancel.clone()));
        tokio::time::sleep(Duration::from_millis(200)).await;

        // raspistill writes to a temporary name and renames when done
        let partial = image_dir.join("snap.jpg~");
        let path = image_dir.join("snap.jpg");
        fs::write(&partial, b"jpeg").unwrap();
        fs::rename(&partial, &path).unwrap();

        for _ in 0..50 {
            if gateway.sent().len() >= OWNERS.len() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        // leave room for a late duplicate
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
        worker.await.unwrap().unwrap();

        let sent = gateway.sent();
        assert_eq!(sent.len(), OWNERS.len());
        for (owner, sent) in OWNERS.iter().zip(&sent) {
            assert_eq!(
                sent,
                &Sent::Document {
                    chat_id: *owner,
                    path: path.clone(),
                    caption: path.display().to_string(),
                }
            );
        }
        assert!(path.exists());
    }
}
