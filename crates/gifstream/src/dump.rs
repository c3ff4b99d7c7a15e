use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use gifstream::session::SessionId;

/// `<dir>/session-<n>-<frame>.ppm`
pub fn frame_path(dir: &Path, session: SessionId, frame: u64) -> PathBuf {
    dir.join(format!("{session}-{frame:06}.ppm"))
}

/// Write an ARGB canvas as a binary PPM (P6). Alpha is dropped, so
/// transparent pixels come out black.
pub fn write_ppm(path: &Path, canvas: &[u32], width: u16, height: u16) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write!(out, "P6\n{width} {height}\n255\n")?;
    for px in canvas {
        let [_, r, g, b] = px.to_be_bytes();
        out.write_all(&[r, g, b])?;
    }
    out.flush()
}
