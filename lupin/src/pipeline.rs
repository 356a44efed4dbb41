//! Bounded producer/consumer pipeline.
//!
//! ```text
//! producer --[input queue]--> workers x W --[output queue]--> writer --> sink
//! ```
//!
//! The producer closes the input queue with one `Stop` per worker; the
//! output queue gets a single `Stop` once every worker is done. Workers
//! that do not finish within `max_join_retries` polls are asked to stop
//! through an interrupt flag and, failing that, detached.
//!
//! Sends into a full queue are bounded the same way. If the input queue
//! stays full for `max_join_retries` polls, or every worker has exited,
//! the producer raises the interrupt flag and drops the records it could
//! not queue.

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use log::{info, warn};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

enum Message<T> {
    Record(T),
    Stop,
}

/// A bounded multi-producer, multi-consumer queue with blocking
/// `put`/`take` and sentinel-based closing
pub struct BlockingQueue<T> {
    tx: Sender<Message<T>>,
    rx: Receiver<Message<T>>,
}

impl<T> Clone for BlockingQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T> BlockingQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self { tx, rx }
    }

    pub fn put(&self, record: T) -> anyhow::Result<()> {
        self.tx
            .send(Message::Record(record))
            .map_err(|_| anyhow::anyhow!("queue disconnected"))
    }

    /// `None` once a `Stop` is taken
    pub fn take(&self) -> Option<T> {
        match self.rx.recv() {
            Ok(Message::Record(x)) => Some(x),
            Ok(Message::Stop) | Err(_) => None,
        }
    }

    /// Wake up `n_consumers` consumers after the last record
    pub fn close(&self, n_consumers: usize) -> anyhow::Result<()> {
        for _ in 0..n_consumers {
            self.tx
                .send(Message::Stop)
                .map_err(|_| anyhow::anyhow!("queue disconnected"))?;
        }
        Ok(())
    }

    /// Send `msg`, waiting at most `max_polls` polls. Gives up early
    /// once the interrupt flag is up or `alive` reports no consumer.
    fn send_bounded(
        &self,
        msg: Message<T>,
        alive: &dyn Fn() -> bool,
        max_polls: usize,
        poll: Duration,
        interrupt: &AtomicBool,
    ) -> bool {
        let mut msg = msg;
        for _ in 0..=max_polls {
            match self.tx.send_timeout(msg, poll) {
                Ok(()) => return true,
                Err(e) => msg = e.into_inner(),
            }
            if interrupt.load(Ordering::SeqCst) || !alive() {
                return false;
            }
        }
        false
    }

    /// Discard queued records, returning how many there were
    fn drain(&self) -> usize {
        let mut n = 0;
        loop {
            match self.rx.try_recv() {
                Ok(Message::Record(_)) => n += 1,
                Ok(Message::Stop) => {}
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        n
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Per-worker processing of one record. Each worker owns its instance.
pub trait RecordProcessor: Send {
    type Input: Send + 'static;
    type Output: Send + 'static;

    fn process(&mut self, record: Self::Input) -> anyhow::Result<Self::Output>;
}

/// Final destination of processed records, driven by the writer thread
pub trait OutputSink<T>: Send {
    fn write(&mut self, record: T) -> anyhow::Result<()>;

    fn finish(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<T: Send> OutputSink<T> for Vec<T> {
    fn write(&mut self, record: T) -> anyhow::Result<()> {
        self.push(record);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// `0` means every available core
    pub n_workers: usize,
    pub queue_capacity: usize,
    pub max_join_retries: usize,
    pub join_poll: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            n_workers: 0,
            queue_capacity: 128,
            max_join_retries: 200,
            join_poll: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    pub n_read: usize,
    pub n_processed: usize,
    pub n_failed: usize,
    pub n_written: usize,
    /// records never handed to a worker
    pub n_dropped: usize,
    /// the interrupt flag had to be raised
    pub interrupted: bool,
    /// threads left running
    pub n_detached: usize,
}

#[derive(Default)]
struct Counters {
    processed: AtomicUsize,
    failed: AtomicUsize,
    written: AtomicUsize,
}

/// Poll `handles` until they finish. After `max_retries` polls the
/// interrupt flag is raised and one more round is granted; anything
/// still running after that is detached.
fn join_with_retries<T>(
    handles: Vec<JoinHandle<T>>,
    max_retries: usize,
    poll: Duration,
    interrupt: &AtomicBool,
) -> (Vec<T>, bool, usize) {
    let mut pending = handles;
    let mut done = Vec::with_capacity(pending.len());
    let mut interrupted = false;

    for round in 0..(max_retries + 2) {
        let (finished, running): (Vec<_>, Vec<_>) =
            pending.into_iter().partition(|h| h.is_finished());
        for h in finished {
            match h.join() {
                Ok(x) => done.push(x),
                Err(_) => warn!("a pipeline thread panicked"),
            }
        }
        pending = running;
        if pending.is_empty() {
            break;
        }
        if round == max_retries {
            warn!("{} threads still running, interrupting", pending.len());
            interrupt.store(true, Ordering::SeqCst);
            interrupted = true;
        }
        thread::sleep(poll);
    }

    let n_detached = pending.len();
    if n_detached > 0 {
        warn!("detaching {} unresponsive threads", n_detached);
    }
    (done, interrupted, n_detached)
}

///
/// Push `records` through `W` workers into `sink`
///
/// * `records` - input records, consumed in order by the producer
/// * `factory` - builds the processor of worker `w`
/// * `sink` - receives every successfully processed record
/// * `config` - workers, queue capacity, join policy
///
/// Returns the summary and the sink, unless the writer had to be
/// detached.
///
pub fn run_pipeline<P, F, I, S>(
    records: I,
    factory: F,
    sink: S,
    config: &PipelineConfig,
) -> anyhow::Result<(PipelineSummary, Option<S>)>
where
    P: RecordProcessor + 'static,
    F: Fn(usize) -> P,
    I: IntoIterator<Item = P::Input>,
    S: OutputSink<P::Output> + 'static,
{
    let n_workers = if config.n_workers == 0 {
        num_cpus::get()
    } else {
        config.n_workers
    };

    let input = BlockingQueue::<P::Input>::new(config.queue_capacity);
    let output = BlockingQueue::<P::Output>::new(config.queue_capacity);
    let counters = Arc::new(Counters::default());
    let interrupt = Arc::new(AtomicBool::new(false));

    ////////////
    // writer //
    ////////////

    let writer = {
        let output = output.clone();
        let counters = counters.clone();
        let mut sink = sink;
        thread::Builder::new()
            .name("lupin-writer".into())
            .spawn(move || {
                while let Some(rec) = output.take() {
                    match sink.write(rec) {
                        Ok(()) => {
                            counters.written.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => warn!("writer: {}", e),
                    }
                }
                if let Err(e) = sink.finish() {
                    warn!("writer: {}", e);
                }
                sink
            })?
    };

    /////////////
    // workers //
    /////////////

    let mut workers = Vec::with_capacity(n_workers);
    for w in 0..n_workers {
        let mut proc = factory(w);
        let input = input.clone();
        let output = output.clone();
        let counters = counters.clone();
        let interrupt = interrupt.clone();
        let handle = thread::Builder::new()
            .name(format!("lupin-worker-{}", w))
            .spawn(move || {
                while !interrupt.load(Ordering::SeqCst) {
                    let Some(rec) = input.take() else {
                        break;
                    };
                    match proc.process(rec) {
                        Ok(out) => {
                            counters.processed.fetch_add(1, Ordering::Relaxed);
                            if output.put(out).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            counters.failed.fetch_add(1, Ordering::Relaxed);
                            warn!("worker {}: {}", w, e);
                        }
                    }
                }
            })?;
        workers.push(handle);
    }

    //////////////
    // producer //
    //////////////

    let workers_alive = || workers.iter().any(|h| !h.is_finished());
    let send = |msg: Message<P::Input>| {
        input.send_bounded(
            msg,
            &workers_alive,
            config.max_join_retries,
            config.join_poll,
            &interrupt,
        )
    };

    let mut records = records.into_iter();
    let mut n_read = 0;
    let mut n_dropped = 0;
    let mut stalled = false;
    for rec in records.by_ref() {
        n_read += 1;
        if !send(Message::Record(rec)) {
            stalled = true;
            break;
        }
    }

    if stalled {
        interrupt.store(true, Ordering::SeqCst);
        let rest = records.count();
        n_read += rest;
        n_dropped = 1 + rest + input.drain();
        warn!(
            "workers stopped taking records, interrupting; {} records dropped",
            n_dropped
        );
    } else {
        info!("{} records queued for {} workers", n_read, n_workers);
    }

    for _ in 0..n_workers {
        if !send(Message::Stop) {
            interrupt.store(true, Ordering::SeqCst);
            stalled = true;
            break;
        }
    }

    let (_, mut interrupted, mut n_detached) =
        join_with_retries(workers, config.max_join_retries, config.join_poll, &interrupt);
    interrupted |= stalled;

    // the writer ignores the interrupt flag; only its liveness matters
    let writer_alive = || !writer.is_finished();
    if !output.send_bounded(
        Message::Stop,
        &writer_alive,
        config.max_join_retries,
        config.join_poll,
        &AtomicBool::new(false),
    ) {
        warn!("writer is not draining its queue");
    }
    let (mut sinks, writer_interrupted, writer_detached) =
        join_with_retries(vec![writer], config.max_join_retries, config.join_poll, &interrupt);
    interrupted |= writer_interrupted;
    n_detached += writer_detached;

    let summary = PipelineSummary {
        n_read,
        n_processed: counters.processed.load(Ordering::Relaxed),
        n_failed: counters.failed.load(Ordering::Relaxed),
        n_written: counters.written.load(Ordering::Relaxed),
        n_dropped,
        interrupted,
        n_detached,
    };
    info!("{:?}", summary);
    Ok((summary, sinks.pop()))
}
