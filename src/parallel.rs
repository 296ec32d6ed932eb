//! Decoding batches of files on worker threads
//!
//! Files are split into contiguous chunks, one per thread. Each thread opens
//! and decodes its own files and hands them to its clone of the processor,
//! so no stream or decoder state is ever shared between threads.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;

use crate::dispatch::{open_path, DecodedFile};
use crate::error::{Error, Result};
use crate::policy::DecodeOptions;

/// Trait for types that consume decoded files on worker threads
///
/// Each thread works on its own clone, set up with [`FileProcessor::set_tid`].
pub trait FileProcessor: Send + Clone {
    /// Process a single decoded file
    fn process_file(&mut self, path: &Path, file: DecodedFile) -> Result<()>;

    /// Called when a thread finishes processing its batch
    /// Default implementation does nothing
    fn on_batch_complete(&mut self) -> Result<()> {
        Ok(())
    }

    /// Set the thread ID for this processor
    ///
    /// Each thread should call this method with its own unique ID.
    fn set_tid(&mut self, _tid: usize) {
        // Default implementation does nothing
    }

    /// Get the thread ID for this processor
    fn get_tid(&self) -> Option<usize> {
        None
    }
}

/// Decodes `paths` across `num_threads` threads (0 uses every core)
///
/// A failing file stops its own thread only. Once every thread has joined,
/// the first error in thread order is returned.
///
/// # Arguments
///
/// * `paths` - The files to decode
/// * `processor` - Cloned once per thread
/// * `options` - Options for every decode
/// * `num_threads` - The number of threads to spawn
pub fn decode_parallel<P, I>(
    paths: I,
    processor: P,
    options: DecodeOptions,
    num_threads: usize,
) -> Result<()>
where
    P: FileProcessor + 'static,
    I: IntoIterator,
    I::Item: Into<PathBuf>,
{
    let paths: Arc<Vec<PathBuf>> = Arc::new(paths.into_iter().map(Into::into).collect());
    if paths.is_empty() {
        return Ok(());
    }

    let num_threads = if num_threads == 0 {
        num_cpus::get()
    } else {
        num_threads
    }
    .min(paths.len());
    let files_per_thread = paths.len().div_ceil(num_threads);
    debug!(
        "decoding {} files on {num_threads} threads",
        paths.len()
    );

    let mut handles = Vec::with_capacity(num_threads);
    for tid in 0..num_threads {
        let mut processor = processor.clone();
        let paths = paths.clone();
        processor.set_tid(tid);

        let handle = std::thread::spawn(move || -> Result<()> {
            let start = tid * files_per_thread;
            let end = (start + files_per_thread).min(paths.len());
            if start >= end {
                return Ok(()); // No files for this thread
            }

            for path in &paths[start..end] {
                let file = open_path(path, options)?;
                processor.process_file(path, file)?;
            }
            processor.on_batch_complete()
        });
        handles.push(handle);
    }

    let mut first_error = None;
    for (tid, handle) in handles.into_iter().enumerate() {
        let outcome = handle.join().unwrap_or(Err(Error::WorkerPanic(tid)));
        if let Err(err) = outcome {
            first_error.get_or_insert(err);
        }
    }
    first_error.map_or(Ok(()), Err)
}

#[cfg(test)]
mod testing {
    use std::collections::HashSet;
    use std::io::Write;

    use parking_lot::Mutex;
    use tempfile::TempDir;

    use super::*;
    use crate::core::DataFile;
    use crate::dispatch::Format;
    use crate::error::ErrorKind;
    use crate::fixtures::{CelV4, GenericFile};

    #[derive(Clone, Default)]
    struct TestProcessor {
        tid: Option<usize>,
        seen: Arc<Mutex<Vec<PathBuf>>>,
        cells: Arc<Mutex<usize>>,
        batches: Arc<Mutex<usize>>,
    }
    impl FileProcessor for TestProcessor {
        fn process_file(&mut self, path: &Path, file: DecodedFile) -> Result<()> {
            assert!(self.tid.is_some());
            self.seen.lock().push(path.to_path_buf());
            *self.cells.lock() += file.table().num_rows();
            Ok(())
        }

        fn on_batch_complete(&mut self) -> Result<()> {
            *self.batches.lock() += 1;
            Ok(())
        }

        fn set_tid(&mut self, tid: usize) {
            self.tid = Some(tid);
        }

        fn get_tid(&self) -> Option<usize> {
            self.tid
        }
    }

    fn write_files(dir: &TempDir, count: usize) -> Vec<PathBuf> {
        (0..count)
            .map(|i| {
                let path = dir.path().join(format!("sample_{i}.cel"));
                let mut file = std::fs::File::create(&path).unwrap();
                file.write_all(&CelV4::new(2, 3).build()).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn test_every_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_files(&dir, 10);
        for num_threads in [0, 1, 3, 16] {
            let processor = TestProcessor::default();
            decode_parallel(paths.clone(), processor.clone(), DecodeOptions::default(), num_threads)
                .unwrap();
            let seen: HashSet<PathBuf> = processor.seen.lock().iter().cloned().collect();
            assert_eq!(processor.seen.lock().len(), 10);
            assert_eq!(seen.len(), 10);
            assert_eq!(*processor.cells.lock(), 60);
        }
    }

    #[test]
    fn test_batch_per_thread() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_files(&dir, 4);
        let processor = TestProcessor::default();
        decode_parallel(paths, processor.clone(), DecodeOptions::default(), 2).unwrap();
        assert_eq!(*processor.batches.lock(), 2);
    }

    #[test]
    fn test_first_failure_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = write_files(&dir, 3);
        let bad = dir.path().join("bad.cel");
        std::fs::write(&bad, b"\x01\x02\x03\x04garbage").unwrap();
        paths.insert(1, bad);

        let processor = TestProcessor::default();
        let err = decode_parallel(paths, processor.clone(), DecodeOptions::default(), 2)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnrecognizedFormat);
        // the other thread still finished its files
        assert!(processor.seen.lock().len() >= 2);
    }

    #[test]
    fn test_mixed_formats() {
        #[derive(Clone, Default)]
        struct FormatCounter(Arc<Mutex<Vec<Format>>>);
        impl FileProcessor for FormatCounter {
            fn process_file(&mut self, _path: &Path, file: DecodedFile) -> Result<()> {
                self.0.lock().push(file.format());
                Ok(())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let mut paths = write_files(&dir, 1);
        let generic = dir.path().join("calls.chp");
        std::fs::write(&generic, GenericFile::calls().build()).unwrap();
        paths.push(generic);

        let counter = FormatCounter::default();
        decode_parallel(paths, counter.clone(), DecodeOptions::default(), 0).unwrap();
        let mut formats = counter.0.lock().clone();
        formats.sort_by_key(|f| f.signature());
        assert_eq!(formats, vec![Format::CelXda, Format::Generic]);
    }

    #[test]
    fn test_empty_batch() {
        let processor = TestProcessor::default();
        decode_parallel(Vec::<PathBuf>::new(), processor.clone(), DecodeOptions::default(), 4)
            .unwrap();
        assert_eq!(*processor.batches.lock(), 0);
    }
}
