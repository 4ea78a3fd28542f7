//! Byte-accounting scenarios for the reader lease.

use std::io::Write;
use std::time::Duration;

use ferrexpect::stream::{pipe, PipeWriter, ReaderLease, SourceConfig};
use ferrexpect::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Copy everything a fresh logical reader sees into `tx` until it fails.
fn spawn_copier(
    lease: &ReaderLease,
    token: CancellationToken,
    tx: mpsc::UnboundedSender<u8>,
) -> tokio::task::JoinHandle<Result<(), Error>> {
    let mut reader = lease.new_reader(token);
    tokio::spawn(async move {
        let mut buf = [0u8; 64];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            for &b in &buf[..n] {
                let _ = tx.send(b);
            }
        }
    })
}

async fn round(lease: &ReaderLease, writer: &mut PipeWriter, expected: &str) {
    let token = CancellationToken::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let copier = spawn_copier(lease, token.clone(), tx);

    writer.write_all(expected.as_bytes()).unwrap();

    for (i, want) in expected.bytes().enumerate() {
        let got = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("byte arrived")
            .expect("copier alive");
        assert_eq!(got, want, "byte {} of {:?}", i, expected);
    }

    // The copier is now waiting on a physical read that is still in flight.
    token.cancel();
    let result = copier.await.unwrap();
    assert!(matches!(result, Err(Error::Cancelled)));

    // Nothing beyond the expected bytes reached this reader.
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_cancelled_reader_does_not_steal_bytes() {
    let (reader, mut writer) = pipe();
    let lease = ReaderLease::new(reader).unwrap();

    // First reader is cancelled with a read in flight; the second must still
    // see every byte of its word.
    round(&lease, &mut writer, "apple").await;
    round(&lease, &mut writer, "banana").await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rotating_readers_see_every_byte_once() {
    let _ = env_logger::builder().is_test(true).try_init();

    let (reader, mut writer) = pipe();
    let lease = ReaderLease::with_config(reader, SourceConfig::default().chunk_size(7)).unwrap();

    let expected: Vec<u8> = (0..2000u32).map(|i| (i % 251) as u8).collect();
    let to_write = expected.clone();
    let producer = std::thread::spawn(move || {
        for chunk in to_write.chunks(13) {
            writer.write_all(chunk).unwrap();
            std::thread::sleep(Duration::from_micros(200));
        }
        // Dropping the writer ends the stream.
    });

    let mut received = Vec::new();
    let mut round = 0u32;
    'outer: loop {
        round += 1;
        let token = CancellationToken::new();
        let mut r = lease.new_reader(token.clone());

        // Alternate between deadline-bounded and cancelled readers.
        if round % 2 == 0 {
            r.set_read_deadline(Some(Instant::now() + Duration::from_millis(1)));
        } else {
            let canceller = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                canceller.cancel();
            });
        }

        let mut buf = [0u8; 5];
        loop {
            match r.read(&mut buf).await {
                Ok(0) => break 'outer,
                Ok(n) => received.extend_from_slice(&buf[..n]),
                Err(e) if e.is_temporary() => break,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
    }

    producer.join().unwrap();
    assert_eq!(received.len(), expected.len());
    assert_eq!(received, expected);
}

#[tokio::test]
async fn test_concurrent_readers_split_stream_without_overlap() {
    let (reader, mut writer) = pipe();
    let lease = ReaderLease::with_config(reader, SourceConfig::default().chunk_size(3)).unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let mut r = lease.new_reader(CancellationToken::new());
        handles.push(tokio::spawn(async move {
            let mut got = Vec::new();
            let mut buf = [0u8; 2];
            loop {
                match r.read(&mut buf).await {
                    Ok(0) => return got,
                    Ok(n) => got.extend_from_slice(&buf[..n]),
                    Err(e) => panic!("unexpected error: {}", e),
                }
            }
        }));
    }

    let payload: Vec<u8> = (b'a'..=b'z').cycle().take(300).collect();
    writer.write_all(&payload).unwrap();
    drop(writer);

    let mut total = Vec::new();
    for h in handles {
        total.extend(h.await.unwrap());
    }
    total.sort_unstable();
    let mut want = payload.clone();
    want.sort_unstable();
    assert_eq!(total, want);
}
