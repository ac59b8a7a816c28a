//! Integration tests for crcbench
//!
//! These tests drive the real binary, so the process strategies exercise
//! actual worker processes.

use crcbench::{
    ChecksumTask, Registry, RunConfig, Strategy, TaskPool, WHOLE_BUFFER, WorkerHandle,
    build_pool, run_benchmark,
};
use crcbench_ipc::{
    DataSource, FrameReader, FrameWriter, SupervisorCommand, TaskSpec, WorkerMessage,
};
use std::path::Path;
use std::process::{Command, Stdio};

fn worker_binary() -> &'static Path {
    Path::new(env!("CARGO_BIN_EXE_crcbench"))
}

fn sample_data(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i.wrapping_mul(131) ^ (i >> 5)) as u8).collect()
}

const ALL_STRATEGIES: [Strategy; 4] = [
    Strategy::Serial,
    Strategy::Threads,
    Strategy::ProcessShared,
    Strategy::ProcessCopy,
];

/// Every strategy returns the reference checksum for every task
#[test]
fn test_strategies_agree_with_reference() {
    let registry = Registry::with_builtin();
    let data = sample_data(2 * 1024 * 1024 + 3);

    for strategy in ALL_STRATEGIES {
        let mut pool = build_pool(strategy, data.clone(), 3, worker_binary()).unwrap();
        assert_eq!(pool.strategy(), strategy);

        for algorithm in registry.iter() {
            let reference = algorithm.checksum(&data);
            for chunk_size in [4096, WHOLE_BUFFER] {
                let task = ChecksumTask {
                    algorithm,
                    chunk_size,
                };
                let results = pool.map(&task, 3).unwrap();
                assert_eq!(results.len(), 3);
                for result in &results {
                    assert_eq!(
                        result.checksum, reference,
                        "{} / {} / chunk {}",
                        strategy, algorithm.name, chunk_size
                    );
                }
            }
        }
    }
}

/// Only the shared-memory strategy has a one-time setup cost
#[test]
fn test_segment_setup_reported_once() {
    let data = vec![b' '; 1024 * 1024];

    let shared = build_pool(Strategy::ProcessShared, data.clone(), 2, worker_binary()).unwrap();
    let setup = shared.setup_cost().expect("shared pool reports setup");
    assert_eq!(setup.len, data.len());
    drop(shared);

    let copying = build_pool(Strategy::ProcessCopy, data, 2, worker_binary()).unwrap();
    assert!(copying.setup_cost().is_none());
}

#[test]
fn test_shared_run_output() {
    let registry = Registry::with_builtin().select(&["crc32"]).unwrap();
    let config = RunConfig {
        tasks: 2,
        strategy: Strategy::ProcessShared,
        chunk_sizes: vec![65536, WHOLE_BUFFER],
    };

    let mut out = Vec::new();
    let rows = run_benchmark(
        &registry,
        &config,
        vec![b' '; 1024 * 1024],
        worker_binary(),
        &mut out,
    )
    .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].checksum, rows[1].checksum);
    // Setup time is measured per task, separately from the segment cost
    assert!(rows.iter().all(|r| r.setup.count == 2 && r.setup.mean >= 0.0));

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("using 2 process(es)"));
    assert_eq!(text.matches("of shared memory created in").count(), 1);
}

/// Shutdown stops the worker with a clean exit and can be repeated
#[test]
fn test_worker_shutdown_reaps_process() {
    let mut worker = WorkerHandle::spawn(worker_binary(), None).unwrap();
    assert!(worker.is_alive());

    worker.shutdown().unwrap();
    assert!(!worker.is_alive());
    worker.shutdown().unwrap();
}

/// A worker started without inherited descriptors talks over stdin/stdout
#[test]
fn test_worker_stdio_fallback() {
    let mut child = Command::new(worker_binary())
        .arg("--worker")
        .env_remove("CRCBENCH_IPC_FD")
        .env_remove("CRCBENCH_SHM_FD")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .unwrap();

    let mut writer = FrameWriter::new(child.stdin.take().unwrap());
    let mut reader = FrameReader::new(child.stdout.take().unwrap());

    match reader.read::<WorkerMessage>().unwrap() {
        WorkerMessage::Hello(caps) => {
            assert!(caps.supports("adler32"));
            assert_eq!(caps.shared_len, None);
        }
        other => panic!("expected Hello, got {:?}", other),
    }

    let payload = b"Wikipedia";
    let spec = TaskSpec {
        task_index: 7,
        algorithm: "adler32".to_string(),
        chunk_size: 4,
        data: DataSource::Inline {
            len: payload.len() as u64,
        },
    };
    writer
        .write_with_payload(&SupervisorCommand::Run(spec), payload)
        .unwrap();

    match reader.read::<WorkerMessage>().unwrap() {
        WorkerMessage::TaskComplete(report) => {
            assert_eq!(report.task_index, 7);
            assert_eq!(report.checksum, 0x11e6_0398);
        }
        other => panic!("expected TaskComplete, got {:?}", other),
    }

    writer.write(&SupervisorCommand::Shutdown).unwrap();
    assert!(child.wait().unwrap().success());
}

fn crcbench_in_empty_dir(args: &[&str]) -> std::process::Output {
    let dir = std::env::temp_dir().join(format!("crcbench-it-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    Command::new(worker_binary())
        .args(args)
        .current_dir(&dir)
        .output()
        .unwrap()
}

#[test]
fn test_binary_process_copy_run() {
    let output = crcbench_in_empty_dir(&[
        "-n",
        "2",
        "-m",
        "1",
        "-P",
        "-a",
        "crc32",
        "--min-chunk-log2",
        "12",
        "--max-chunk-log2",
        "13",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let expected = Registry::with_builtin()
        .lookup("crc32")
        .unwrap()
        .checksum(&vec![b' '; 1024 * 1024]);
    let stdout = String::from_utf8(output.stdout).unwrap();
    let rows: Vec<&str> = stdout.lines().filter(|l| l.starts_with("crc32 ")).collect();
    assert_eq!(rows.len(), 3);
    for row in rows {
        assert!(row.contains(&format!(" {:08x} ", expected)), "{}", row);
    }
}

#[test]
fn test_binary_unknown_algorithm_exit_code() {
    let output = crcbench_in_empty_dir(&["-a", "md5"]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.starts_with("Error: "), "{}", stderr);
    assert!(stderr.contains("md5"));
}
