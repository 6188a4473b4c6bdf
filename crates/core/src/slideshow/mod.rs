use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Broad media categories the slideshow distinguishes for display timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Gif,
    Video,
}

impl MediaKind {
    /// Classifies a path by extension; `None` for unsupported files.
    pub fn classify(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "bmp" => Some(Self::Image),
            "gif" => Some(Self::Gif),
            "mp4" | "avi" | "mov" | "mkv" => Some(Self::Video),
            _ => None,
        }
    }
}

/// Recursively collects every supported media file under `dir`.
pub fn scan_folder(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    collect(dir, &mut found)?;
    Ok(found)
}

fn collect(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect(&path, found)?;
        } else if MediaKind::classify(&path).is_some() {
            found.push(path);
        }
    }
    Ok(())
}

/// Display-timing bounds for the slideshow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideshowTunables {
    /// Minimum display time for images and GIFs, in seconds.
    pub min_display_secs: f64,
    /// Maximum display time for images and GIFs, in seconds.
    pub max_display_secs: f64,
    /// Fixed display time for videos. Headless playback cannot observe an
    /// end-of-media signal, so videos run on a timer like everything else.
    pub video_display_secs: f64,
}

impl Default for SlideshowTunables {
    fn default() -> Self {
        Self {
            min_display_secs: 0.5,
            max_display_secs: 4.0,
            video_display_secs: 30.0,
        }
    }
}

/// Owns the shuffled playlist, the current index, and the auto-advance
/// deadline. Independent of the beat engine; both are started and stopped
/// together by the session lifecycle.
#[derive(Debug)]
pub struct Slideshow<R: Rng = StdRng> {
    tunables: SlideshowTunables,
    rng: R,
    playlist: Vec<PathBuf>,
    index: usize,
    advance_at: Option<Duration>,
}

impl Slideshow<StdRng> {
    pub fn new(tunables: SlideshowTunables) -> Self {
        Self::with_rng(tunables, StdRng::from_os_rng())
    }
}

impl<R: Rng> Slideshow<R> {
    pub fn with_rng(tunables: SlideshowTunables, rng: R) -> Self {
        Self {
            tunables,
            rng,
            playlist: Vec::new(),
            index: 0,
            advance_at: None,
        }
    }

    /// Replaces the playlist with a fresh shuffle of `files`.
    pub fn load(&mut self, mut files: Vec<PathBuf>) {
        files.shuffle(&mut self.rng);
        self.playlist = files;
        self.index = 0;
        self.advance_at = None;
    }

    pub fn is_empty(&self) -> bool {
        self.playlist.is_empty()
    }

    pub fn len(&self) -> usize {
        self.playlist.len()
    }

    /// Path currently on display, if the playlist is non-empty.
    pub fn current(&self) -> Option<&Path> {
        self.playlist.get(self.index).map(PathBuf::as_path)
    }

    /// Arms the auto-advance timer for the item currently on display.
    pub fn start(&mut self, now: Duration) {
        if self.playlist.is_empty() {
            return;
        }
        self.arm(now);
    }

    pub fn stop(&mut self) {
        self.advance_at = None;
    }

    /// Deadline of the pending auto-advance, if armed.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.advance_at
    }

    /// Auto-advances once the display interval has elapsed, returning the
    /// newly shown path.
    pub fn tick(&mut self, now: Duration) -> Option<&Path> {
        if self.advance_at.is_some_and(|deadline| now >= deadline) {
            self.index = (self.index + 1) % self.playlist.len();
            self.arm(now);
            return self.current();
        }
        None
    }

    /// Manual skip forward; wraps at the end of the playlist.
    pub fn next(&mut self, now: Duration) -> Option<&Path> {
        if self.playlist.is_empty() {
            return None;
        }
        self.index = (self.index + 1) % self.playlist.len();
        self.arm(now);
        self.current()
    }

    /// Manual step back; wraps at the start of the playlist.
    pub fn prev(&mut self, now: Duration) -> Option<&Path> {
        if self.playlist.is_empty() {
            return None;
        }
        self.index = (self.index + self.playlist.len() - 1) % self.playlist.len();
        self.arm(now);
        self.current()
    }

    fn arm(&mut self, now: Duration) {
        let kind = self.current().and_then(MediaKind::classify);
        let secs = match kind {
            Some(MediaKind::Video) => self.tunables.video_display_secs,
            _ => self
                .rng
                .random_range(self.tunables.min_display_secs..=self.tunables.max_display_secs),
        };
        self.advance_at = Some(now + Duration::from_secs_f64(secs.max(0.0)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(value: u64) -> Duration {
        Duration::from_secs(value)
    }

    fn show(files: &[&str]) -> Slideshow<StdRng> {
        let mut show = Slideshow::with_rng(
            SlideshowTunables {
                min_display_secs: 2.0,
                max_display_secs: 2.0,
                video_display_secs: 30.0,
            },
            StdRng::seed_from_u64(1),
        );
        show.load(files.iter().map(PathBuf::from).collect());
        show
    }

    #[test]
    fn classifies_supported_extensions() {
        assert_eq!(MediaKind::classify(Path::new("a.PNG")), Some(MediaKind::Image));
        assert_eq!(MediaKind::classify(Path::new("b.gif")), Some(MediaKind::Gif));
        assert_eq!(MediaKind::classify(Path::new("c.mp4")), Some(MediaKind::Video));
        assert_eq!(MediaKind::classify(Path::new("d.txt")), None);
        assert_eq!(MediaKind::classify(Path::new("noext")), None);
    }

    #[test]
    fn navigation_wraps_both_ways() {
        let mut show = show(&["a.png", "b.png", "c.png"]);
        let first = show.current().unwrap().to_path_buf();

        show.next(secs(0));
        show.next(secs(0));
        show.next(secs(0));
        assert_eq!(show.current().unwrap(), first.as_path());

        show.prev(secs(0));
        show.prev(secs(0));
        show.prev(secs(0));
        assert_eq!(show.current().unwrap(), first.as_path());
    }

    #[test]
    fn auto_advances_on_deadline() {
        let mut show = show(&["a.png", "b.png"]);
        show.start(secs(0));
        assert_eq!(show.next_deadline(), Some(secs(2)));

        assert!(show.tick(secs(1)).is_none());
        let before = show.current().unwrap().to_path_buf();
        let shown = show.tick(secs(2)).unwrap().to_path_buf();
        assert_ne!(shown, before);
        assert_eq!(show.next_deadline(), Some(secs(4)));
    }

    #[test]
    fn videos_use_the_fixed_duration() {
        let mut show = show(&["clip.mp4"]);
        show.start(secs(0));
        assert_eq!(show.next_deadline(), Some(secs(30)));
    }

    #[test]
    fn empty_playlist_is_inert() {
        let mut show = show(&[]);
        show.start(secs(0));
        assert_eq!(show.next_deadline(), None);
        assert!(show.tick(secs(100)).is_none());
        assert!(show.next(secs(0)).is_none());
        assert!(show.prev(secs(0)).is_none());
    }
}
