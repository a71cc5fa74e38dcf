//! Streaming row consumption.
//!
//! Bridges a possibly-asynchronous, paged backend feed into a single
//! blocking pull-based sequence. A producer (the store driver side) pushes
//! rows into a bounded queue and finishes with an `End` sentinel; the
//! consumer blocks on the queue, and on seeing the sentinel puts it back so
//! concurrently racing consumers also terminate instead of hanging.
//!
//! Backpressure is the queue bound: the producer blocks when the queue is
//! full, the consumer blocks when it is empty. That is the sole flow-control
//! mechanism between backend fetch rate and consumer processing rate.
//!
//! A disconnected or poisoned queue while blocked is reported as a local
//! warning and treated as an empty result, never a crash: a scan is allowed
//! to end early under interruption rather than hang.

use crate::error::{Result, StoreError};
use crate::row::EncodedRow;
use std::sync::mpsc::{Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Default bound for scan queues.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// One queue element.
enum ScanItem {
    Row(EncodedRow),
    /// Partial scan failure, surfaced to the consumer immediately.
    Failure(String),
    /// Terminal sentinel; re-broadcast by whichever consumer sees it.
    End,
}

struct RowQueue {
    rx: Mutex<Receiver<ScanItem>>,
    tx: SyncSender<ScanItem>,
}

/// Create a bounded producer/consumer pair.
pub fn row_queue(capacity: usize) -> (RowProducer, RowConsumer) {
    let (tx, rx) = std::sync::mpsc::sync_channel(capacity.max(1));
    let queue = Arc::new(RowQueue {
        rx: Mutex::new(rx),
        tx: tx.clone(),
    });
    (
        RowProducer {
            tx,
            finished: false,
        },
        RowConsumer {
            queue,
            buffered: None,
            drained: false,
        },
    )
}

/// Push side of a scan queue.
pub struct RowProducer {
    tx: SyncSender<ScanItem>,
    finished: bool,
}

impl RowProducer {
    /// Push one row, blocking while the queue is full.
    ///
    /// Returns `false` when every consumer is gone; the producer should stop
    /// fetching.
    pub fn push(&self, row: EncodedRow) -> bool {
        self.tx.send(ScanItem::Row(row)).is_ok()
    }

    /// Surface a partial scan failure to the consumer.
    pub fn fail(&mut self, message: String) {
        let _ = self.tx.send(ScanItem::Failure(message));
        self.finish();
    }

    /// Push the terminal sentinel. Idempotent.
    pub fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            let _ = self.tx.send(ScanItem::End);
        }
    }
}

impl Drop for RowProducer {
    fn drop(&mut self) {
        // every exit path terminates the queue, including producer panics
        self.finish();
    }
}

/// Blocking pull side of a scan queue.
///
/// Clones share the underlying queue; each clone keeps its own one-element
/// buffer, so multiple consumers can cooperatively drain one scan.
pub struct RowConsumer {
    queue: Arc<RowQueue>,
    buffered: Option<Result<EncodedRow>>,
    drained: bool,
}

impl Clone for RowConsumer {
    fn clone(&self) -> Self {
        RowConsumer {
            queue: Arc::clone(&self.queue),
            buffered: None,
            drained: false,
        }
    }
}

impl RowConsumer {
    /// Whether another element is available, blocking on an empty queue
    /// until the producer pushes a row or the sentinel.
    pub fn has_next(&mut self) -> bool {
        if self.buffered.is_some() {
            return true;
        }
        if self.drained {
            return false;
        }
        let received = {
            let guard = match self.queue.rx.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.recv()
        };
        match received {
            Ok(ScanItem::Row(row)) => {
                self.buffered = Some(Ok(row));
                true
            }
            Ok(ScanItem::Failure(message)) => {
                self.buffered = Some(Err(StoreError::Backend(message)));
                true
            }
            Ok(ScanItem::End) => {
                // put the sentinel back so racing consumers also terminate
                if self.queue.tx.send(ScanItem::End).is_err() {
                    warn!("scan queue closed while re-broadcasting end sentinel");
                }
                self.drained = true;
                false
            }
            Err(_) => {
                warn!("interrupted while waiting on scan queue, ending scan early");
                self.drained = true;
                false
            }
        }
    }

    /// Take the buffered element.
    ///
    /// Calling without a preceding successful [`has_next`](Self::has_next)
    /// is a caller error.
    pub fn take_next(&mut self) -> Result<EncodedRow> {
        self.buffered
            .take()
            .unwrap_or(Err(StoreError::ConsumerProtocol(
                "take_next called without a buffered row; call has_next first",
            )))
    }
}

impl Iterator for RowConsumer {
    type Item = Result<EncodedRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.has_next() {
            Some(self.take_next())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::RowKey;
    use lattice_index::ByteKey;
    use std::thread;

    fn row(n: u8) -> EncodedRow {
        EncodedRow {
            key: RowKey {
                partition_key: ByteKey::new(vec![0, 0]),
                sort_key: ByteKey::new(vec![0, 0, 0, n]),
            },
            internal_adapter_id: 1,
            data_id: ByteKey::new(vec![n]),
            dedup_enabled: true,
            duplicated: false,
            fields: Vec::new(),
        }
    }

    #[test]
    fn test_produce_then_consume() {
        let (mut producer, mut consumer) = row_queue(8);
        for n in 0..5 {
            assert!(producer.push(row(n)));
        }
        producer.finish();

        let mut seen = 0;
        while consumer.has_next() {
            let r = consumer.take_next().unwrap();
            assert_eq!(r.data_id, ByteKey::new(vec![seen]));
            seen += 1;
        }
        assert_eq!(seen, 5);
        // terminal state is stable
        assert!(!consumer.has_next());
    }

    #[test]
    fn test_take_next_without_has_next_is_protocol_error() {
        let (_producer, mut consumer) = row_queue(1);
        assert!(matches!(
            consumer.take_next(),
            Err(StoreError::ConsumerProtocol(_))
        ));
    }

    #[test]
    fn test_backpressure_blocks_producer() {
        let (mut producer, mut consumer) = row_queue(2);
        let handle = thread::spawn(move || {
            for n in 0..50 {
                assert!(producer.push(row(n)));
            }
            producer.finish();
        });
        let count = consumer.by_ref().filter(|r| r.is_ok()).count();
        assert_eq!(count, 50);
        handle.join().unwrap();
    }

    #[test]
    fn test_failure_surfaces_then_terminates() {
        let (mut producer, mut consumer) = row_queue(4);
        assert!(producer.push(row(1)));
        producer.fail("page fetch failed".to_string());

        assert!(consumer.has_next());
        assert!(consumer.take_next().is_ok());
        assert!(consumer.has_next());
        assert!(matches!(
            consumer.take_next(),
            Err(StoreError::Backend(_))
        ));
        assert!(!consumer.has_next());
    }

    #[test]
    fn test_drop_without_finish_still_terminates() {
        let (producer, mut consumer) = row_queue(4);
        drop(producer);
        assert!(!consumer.has_next());
    }

    #[test]
    fn test_sentinel_rebroadcast_to_concurrent_consumers() {
        const ROWS: u8 = 40;
        const CONSUMERS: usize = 4;

        let (mut producer, consumer) = row_queue(4);
        let mut handles = Vec::new();
        for _ in 0..CONSUMERS {
            let mut consumer = consumer.clone();
            handles.push(thread::spawn(move || {
                let mut taken = 0usize;
                while consumer.has_next() {
                    consumer.take_next().unwrap();
                    taken += 1;
                }
                // once drained, stays drained
                assert!(!consumer.has_next());
                taken
            }));
        }
        drop(consumer);

        let feeder = thread::spawn(move || {
            for n in 0..ROWS {
                assert!(producer.push(row(n)));
            }
            producer.finish();
        });

        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        feeder.join().unwrap();
        // exactly N takes succeed across all consumers before the sentinel
        assert_eq!(total, ROWS as usize);
    }
}
