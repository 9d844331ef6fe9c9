//! Multi-file import and duplicate detection.
//!
//! Every file is decoded by its own worker with its own image and context, so
//! decoding needs no locking. Only the registry of imported tours is shared;
//! callers own it and serialize access to it.

use crate::decoder::{
    DecodeError, DecodeOptions, DecodedFile, DecodedSession, SessionIdentity, TourRecord,
    decode_hac5_file,
};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Outcome of decoding one file of a batch.
#[derive(Debug)]
pub struct FileImport {
    pub path: PathBuf,
    pub result: Result<DecodedFile, DecodeError>,
}

/// Decode many dumps in parallel. Failures stay attached to their file.
pub fn decode_files<P: AsRef<Path> + Sync>(paths: &[P], options: &DecodeOptions) -> Vec<FileImport> {
    paths
        .par_iter()
        .map(|path| {
            let path = path.as_ref();
            let result = decode_hac5_file(path, options);
            if let Err(error) = &result {
                tracing::warn!("skipping {}: {error}", path.display());
            }
            FileImport {
                path: path.to_path_buf(),
                result,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    New,
    AlreadyImported,
}

/// Tours imported so far, keyed by identity.
#[derive(Debug, Default)]
pub struct TourRegistry {
    tours: HashMap<SessionIdentity, TourRecord>,
}

impl TourRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tours.is_empty()
    }

    pub fn contains(&self, identity: &SessionIdentity) -> bool {
        self.tours.contains_key(identity)
    }

    pub fn get(&self, identity: &SessionIdentity) -> Option<&TourRecord> {
        self.tours.get(identity)
    }

    /// Store a decoded tour unless a tour with the same identity exists.
    pub fn admit(&mut self, decoded: &DecodedSession) -> Admission {
        if self.contains(&decoded.identity) {
            return Admission::AlreadyImported;
        }
        self.tours.insert(
            decoded.identity,
            decoded.session.to_tour_record(decoded.identity),
        );
        Admission::New
    }

    /// Admit every tour of a decoded file.
    pub fn admit_file(&mut self, file: &DecodedFile) -> ImportReport {
        let mut report = ImportReport::default();
        for decoded in &file.sessions {
            match self.admit(decoded) {
                Admission::New => report.imported.push(decoded.identity),
                Admission::AlreadyImported => report.duplicates.push(decoded.identity),
            }
        }
        report
    }
}

/// Identities admitted or skipped by one import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: Vec<SessionIdentity>,
    pub duplicates: Vec<SessionIdentity>,
}

impl ImportReport {
    pub fn merge(&mut self, other: ImportReport) {
        self.imported.extend(other.imported);
        self.duplicates.extend(other.duplicates);
    }
}
