use std::path::PathBuf;

/// One spectrogram's identifying info, as needed to detect cadences: sort key
/// (timestamp, then source name, then filename, matching tuple-comparison
/// order) plus the fields used for the A-B-A-C-A-D match test.
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub timestamp: f64,
    pub source_name: String,
    pub path: PathBuf,
}

impl FileInfo {
    fn sort_key(&self) -> (f64, &str, &std::path::Path) {
        (self.timestamp, &self.source_name, self.path.as_path())
    }
}

/// A matched A-B-A-C-A-D group of six spectrograms, in observation order.
#[derive(Debug, Clone, PartialEq)]
pub struct Cadence {
    pub files: [PathBuf; 6],
}

/// Detects A-B-A-C-A-D cadences in a directory's worth of spectrogram
/// descriptors, sorted by observation time. Consumes the list greedily: take
/// the next six candidates; if positions 0, 2, 4 share a source name and none
/// of 1, 3, 5 match it, emit a cadence and drop all six; otherwise drop just
/// the first candidate and retry.
///
/// `infos` need not already be sorted; this function sorts a copy.
pub fn detect_cadences(infos: &[FileInfo]) -> Vec<Cadence> {
    let mut info: Vec<&FileInfo> = infos.iter().collect();
    info.sort_by(|a, b| {
        a.sort_key()
            .partial_cmp(&b.sort_key())
            .expect("timestamps must be comparable (no NaN)")
    });

    let mut cadences = Vec::new();
    let mut i = 0;
    while i + 6 <= info.len() {
        let candidates = &info[i..i + 6];
        let target = &candidates[0].source_name;
        let on_target_matches = candidates[2].source_name == *target && candidates[4].source_name == *target;
        let off_target_distinct = [1, 3, 5].iter().all(|&j| candidates[j].source_name != *target);

        if on_target_matches && off_target_distinct {
            let files: [PathBuf; 6] = std::array::from_fn(|j| candidates[j].path.clone());
            cadences.push(Cadence { files });
            i += 6;
        } else {
            i += 1;
        }
    }
    cadences
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(timestamp: f64, source_name: &str, path: &str) -> FileInfo {
        FileInfo {
            timestamp,
            source_name: source_name.to_string(),
            path: PathBuf::from(path),
        }
    }

    #[test]
    fn detects_a_clean_a_b_a_c_a_d_cadence() {
        let infos = vec![
            info(0.0, "A", "0.h5"),
            info(1.0, "B", "1.h5"),
            info(2.0, "A", "2.h5"),
            info(3.0, "C", "3.h5"),
            info(4.0, "A", "4.h5"),
            info(5.0, "D", "5.h5"),
        ];
        let cadences = detect_cadences(&infos);
        assert_eq!(cadences.len(), 1);
        assert_eq!(cadences[0].files[0], PathBuf::from("0.h5"));
        assert_eq!(cadences[0].files[5], PathBuf::from("5.h5"));
    }

    #[test]
    fn rejects_an_off_target_matching_the_on_target_name() {
        let infos = vec![
            info(0.0, "A", "0.h5"),
            info(1.0, "A", "1.h5"),
            info(2.0, "A", "2.h5"),
            info(3.0, "C", "3.h5"),
            info(4.0, "A", "4.h5"),
            info(5.0, "D", "5.h5"),
        ];
        assert!(detect_cadences(&infos).is_empty());
    }

    #[test]
    fn skips_one_file_at_a_time_until_a_match_is_found() {
        let infos = vec![
            info(0.0, "junk", "junk.h5"),
            info(1.0, "A", "0.h5"),
            info(2.0, "B", "1.h5"),
            info(3.0, "A", "2.h5"),
            info(4.0, "C", "3.h5"),
            info(5.0, "A", "4.h5"),
            info(6.0, "D", "5.h5"),
        ];
        let cadences = detect_cadences(&infos);
        assert_eq!(cadences.len(), 1);
        assert_eq!(cadences[0].files[0], PathBuf::from("0.h5"));
    }

    #[test]
    fn sorts_input_by_timestamp_first() {
        let infos = vec![
            info(5.0, "D", "5.h5"),
            info(4.0, "A", "4.h5"),
            info(3.0, "C", "3.h5"),
            info(2.0, "A", "2.h5"),
            info(1.0, "B", "1.h5"),
            info(0.0, "A", "0.h5"),
        ];
        let cadences = detect_cadences(&infos);
        assert_eq!(cadences.len(), 1);
        assert_eq!(cadences[0].files[0], PathBuf::from("0.h5"));
    }

    #[test]
    fn fewer_than_six_files_yields_no_cadences() {
        let infos = vec![info(0.0, "A", "0.h5"), info(1.0, "B", "1.h5")];
        assert!(detect_cadences(&infos).is_empty());
    }
}
