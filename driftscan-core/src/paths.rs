use std::path::{Path, PathBuf};

use crate::event::Event;

/// Finds the ancestor directory whose name contains "GBT", which this layout
/// treats as the session directory (everything below it is `<machine>/<base>.h5`).
fn session_dir(h5_path: &Path) -> Option<&Path> {
    h5_path
        .ancestors()
        .find(|p| p.file_name().is_some_and(|n| n.to_string_lossy().contains("GBT")))
}

/// Rewrites `<H5_ROOT>/<session>/<machine>/<base>.h5` onto a new root,
/// replacing `<H5_ROOT>` with `root` and the `.h5` suffix with `new_ext`.
fn rewrite_under(h5_path: &Path, root: &Path, new_ext: &str) -> Option<PathBuf> {
    let session = session_dir(h5_path)?;
    let relative = h5_path.strip_prefix(session.parent()?).ok()?;
    Some(root.join(relative).with_extension(new_ext))
}

/// `<HIT_MAP_ROOT>/<session>/<machine>/<base>.hitmap` for a given spectrogram path.
pub fn hitmap_path(hit_map_root: &Path, h5_path: &Path) -> Option<PathBuf> {
    rewrite_under(h5_path, hit_map_root, "hitmap")
}

/// `<IMAGE_ROOT>/<session>/<machine>/<base>.<absolute_start_column>.png` for
/// the first non-null hit's filename in `event`.
pub fn event_plot_path(image_root: &Path, event: &Event) -> Option<PathBuf> {
    let h5_path = event.filenames.iter().find(|f| !f.is_empty())?;
    let base = rewrite_under(Path::new(h5_path), image_root, "png")?;
    let chunk_size = event.nchans as i64 / event.coarse_channels as i64;
    let absolute_start_column = event.coarse_channel as i64 * chunk_size + event.first_column();
    let stem = base.file_stem()?.to_string_lossy().into_owned();
    Some(base.with_file_name(format!("{stem}.{absolute_start_column}.png")))
}
