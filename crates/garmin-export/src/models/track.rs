//! Downloaded GPS track files and their formats

use std::fmt;

use bytes::Bytes;

/// Export formats for a GPS track, in order of preference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackFormat {
    Gpx,
    Tcx,
}

impl TrackFormat {
    pub const PREFERENCE: [TrackFormat; 2] = [TrackFormat::Gpx, TrackFormat::Tcx];

    pub fn extension(&self) -> &'static str {
        match self {
            TrackFormat::Gpx => "gpx",
            TrackFormat::Tcx => "tcx",
        }
    }

    /// Download endpoint for an activity in this format
    pub fn download_path(&self, activity_id: i64) -> String {
        format!(
            "/download-service/export/{}/activity/{}",
            self.extension(),
            activity_id
        )
    }
}

impl fmt::Display for TrackFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Raw bytes of a downloaded track; the content is never interpreted
#[derive(Debug, Clone, PartialEq)]
pub struct TrackFile {
    pub format: TrackFormat,
    pub bytes: Bytes,
}

impl TrackFile {
    /// Stable file name for an activity's track
    pub fn file_name(&self, activity_id: i64) -> String {
        format!("{}.{}", activity_id, self.format.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_path() {
        assert_eq!(
            TrackFormat::Tcx.download_path(42),
            "/download-service/export/tcx/activity/42"
        );
    }

    #[test]
    fn test_file_name() {
        let track = TrackFile {
            format: TrackFormat::Gpx,
            bytes: Bytes::from_static(b"<gpx/>"),
        };
        assert_eq!(track.file_name(14512345678), "14512345678.gpx");
    }
}
