//! Batch translation over a pool of named worker threads.
//!
//! Sentences are queued on an `mpsc` channel whose receiver is shared
//! behind a `Mutex`; each worker pulls the next sentence, decodes it on its
//! own arena and sends back `(index, translations)`. Results are put back
//! in input order once every worker has finished.

use std::io;
use std::sync::{mpsc, Mutex};
use std::thread;

use tracing::{debug, debug_span};

use crate::decoder::DecodeOptions;
use crate::table::PhraseTable;
use crate::translator::{Translation, Translator};

type Job<'a> = (usize, &'a [String]);

/// Translate every sentence (already split into terms) with up to
/// `threads` workers. `threads == 0` is treated as 1.
///
/// Setting `options.cancel` stops work between stacks; sentences that had
/// not finished come back empty. Fails only if a worker thread cannot be
/// spawned.
pub fn translate_batch(
    translator: &Translator,
    table: &dyn PhraseTable,
    sentences: &[Vec<String>],
    options: &DecodeOptions,
    threads: usize,
) -> io::Result<Vec<Vec<Translation>>> {
    let threads = threads.clamp(1, sentences.len().max(1));
    let _span = debug_span!("translate_batch", sentences = sentences.len(), threads).entered();

    let (job_tx, job_rx) = mpsc::channel::<Job<'_>>();
    for (idx, terms) in sentences.iter().enumerate() {
        // The receiver is alive until the end of this function.
        let _ = job_tx.send((idx, terms.as_slice()));
    }
    drop(job_tx);
    let job_rx = Mutex::new(job_rx);
    let (result_tx, result_rx) = mpsc::channel::<(usize, Vec<Translation>)>();

    thread::scope(|scope| -> io::Result<()> {
        for n in 0..threads {
            let job_rx = &job_rx;
            let result_tx = result_tx.clone();
            thread::Builder::new()
                .name(format!("fidel-decode-{n}"))
                .spawn_scoped(scope, move || worker(job_rx, result_tx, translator, table, options))?;
        }
        Ok(())
    })?;
    drop(result_tx);

    let mut results = vec![Vec::new(); sentences.len()];
    let mut done = 0usize;
    for (idx, translations) in result_rx {
        results[idx] = translations;
        done += 1;
    }
    debug!(done, cancelled = options.is_cancelled(), "batch finished");
    Ok(results)
}

fn worker(
    jobs: &Mutex<mpsc::Receiver<Job<'_>>>,
    results: mpsc::Sender<(usize, Vec<Translation>)>,
    translator: &Translator,
    table: &dyn PhraseTable,
    options: &DecodeOptions,
) {
    loop {
        let job = match jobs.lock() {
            Ok(rx) => rx.recv(),
            Err(_) => break,
        };
        let Ok((idx, terms)) = job else {
            break;
        };
        if options.is_cancelled() {
            continue;
        }
        let terms: Vec<&str> = terms.iter().map(String::as_str).collect();
        let translations = translator.translate_with(&terms, table, options);
        if results.send((idx, translations)).is_err() {
            break;
        }
    }
}
