mod common;

use common::{assert_close, water_store};
use traj_store::{LoaderConfig, TrajError};
use traj_stream::{append_file, dump, open_file, open_file_streaming, LoadState};

#[test]
fn dump_then_open_preserves_frames() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("water.xyz");
    let traj = water_store(6);
    assert_eq!(dump(&traj, &path, 0, 6, 1).unwrap(), 6);

    let back = open_file(&path).unwrap();
    assert_eq!(back.ntime(), 6);
    assert_eq!(back.znucl(), traj.znucl());
    assert!(back.is_periodic());
    for t in 0..6 {
        assert_close(back.time(t).unwrap(), traj.time(t).unwrap(), 1e-12);
        assert_close(back.etotal(t).unwrap(), traj.etotal(t).unwrap(), 1e-12);
        for (a, b) in back.xcart(t).unwrap().iter().zip(traj.xcart(t).unwrap()) {
            for k in 0..3 {
                assert_close(a[k], b[k], 1e-12);
            }
        }
    }
}

#[test]
fn dump_respects_stride() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("strided.xyz");
    let traj = water_store(7);
    assert_eq!(dump(&traj, &path, 1, 7, 2).unwrap(), 3);
    let back = open_file(&path).unwrap();
    assert_eq!(back.times(), vec![0.5, 1.5, 2.5]);
}

#[test]
fn dump_rejects_bad_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let traj = water_store(3);
    let path = dir.path().join("x.xyz");
    assert!(matches!(dump(&traj, &path, 0, 3, 0), Err(TrajError::Invalid(_))));
    assert!(matches!(
        dump(&traj, &path, 2, 5, 1),
        Err(TrajError::InvalidRange(_))
    ));
    assert!(matches!(
        dump(&traj, dir.path().join("x.nc"), 0, 3, 1),
        Err(TrajError::Unsupported(_))
    ));
}

#[test]
fn unknown_extension_is_unsupported() {
    assert!(matches!(
        open_file("trajectory.bin"),
        Err(TrajError::Unsupported(_))
    ));
}

#[test]
fn append_file_continues_time_axis() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tail.xyz");
    dump(&water_store(3), &path, 0, 3, 1).unwrap();

    let mut traj = water_store(4);
    append_file(&path, &mut traj).unwrap();
    assert_eq!(traj.ntime(), 7);
    let times = traj.times();
    assert!(times.windows(2).all(|w| w[1] > w[0]));
    assert_close(times[4], 2.0, 1e-12);
}

#[test]
fn streaming_open_matches_synchronous_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stream.xyz");
    dump(&water_store(25), &path, 0, 25, 1).unwrap();

    let options = LoaderConfig {
        progress_every: Some(5),
        ..LoaderConfig::default()
    };
    let handle = open_file_streaming(&path, &options).unwrap();
    let streamed = handle.finish().unwrap();
    assert_eq!(streamed, open_file(&path).unwrap());
}

#[test]
fn truncated_file_fails_after_good_frames() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cut.xyz");
    dump(&water_store(4), &path, 0, 4, 1).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    let keep: Vec<&str> = text.lines().take(5 * 3 + 2).collect();
    std::fs::write(&path, keep.join("\n")).unwrap();

    let mut handle = open_file_streaming(&path, &LoaderConfig::default()).unwrap();
    assert_eq!(handle.wait_settled(), LoadState::Failed);
    assert_eq!(handle.ntime_avail(), 3);
    assert!(matches!(handle.take_error(), Some(TrajError::ParseFailure(_))));
}
