//! Restart after the executable was replaced on disk: the successor must be
//! started from the new file, not from the unlinked running image.
//!
//! Three generations of this test binary take part:
//! - the runner copies the binary to a scratch dir and starts the copy;
//! - the copy renames a fresh copy over itself, then restarts with one listener;
//! - the successor (started from the new file) answers one connection.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use sockvisor::{LISTEN_FDS, Listener, ListenerRef, TcpTransport, inherit, restart};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const TEST_NAME: &str = "restart_starts_the_replaced_binary";
const STAGE: &str = "SOCKVISOR_UPGRADE_STAGE";
const DEADLINE: Duration = Duration::from_secs(30);

#[tokio::test]
async fn restart_starts_the_replaced_binary() {
    if env::var_os(LISTEN_FDS).is_some() {
        successor().await;
    } else if env::var_os(STAGE).is_some() {
        upgraded_predecessor().await;
    } else {
        runner();
    }
}

fn runner() {
    let dir = env::temp_dir().join(format!("sockvisor-upgrade-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    let bin = dir.join("server");
    fs::copy(env::current_exe().unwrap(), &bin).unwrap();

    let status = Command::new(&bin)
        .args([TEST_NAME, "--exact", "--nocapture", "--test-threads=1"])
        .env(STAGE, "1")
        .status()
        .expect("start copied binary");
    fs::remove_dir_all(&dir).unwrap();
    assert!(status.success(), "upgraded generation failed: {status}");
}

async fn upgraded_predecessor() {
    let running = PathBuf::from(env::args_os().next().expect("argv[0]"));
    let staged = running.with_extension("new");
    fs::copy(&running, &staged).unwrap();
    fs::rename(&staged, &running).unwrap();

    let transport = TcpTransport::bind("127.0.0.1:0").await.unwrap();
    let addr = transport.local_addr();
    let registry: Vec<ListenerRef> = vec![Listener::new(transport) as ListenerRef];
    let pid = restart(&registry).expect("spawn successor from the replaced binary");

    let answer = timeout(DEADLINE, async {
        let mut stream = TcpStream::connect(addr).await?;
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await?;
        Ok::<_, std::io::Error>(buf)
    })
    .await
    .expect("successor answer deadline")
    .expect("successor answer");
    assert_eq!(answer, b"upgraded");

    let mut status = 0;
    // SAFETY: waiting on our own child; `status` is a valid out pointer.
    let rc = unsafe { libc::waitpid(pid as libc::pid_t, &mut status, 0) };
    assert_eq!(rc, pid as libc::pid_t);
    assert!(libc::WIFEXITED(status) && libc::WEXITSTATUS(status) == 0, "successor failed");
}

async fn successor() {
    let listeners = inherit().expect("inherit listeners");
    assert_eq!(listeners.len(), 1);

    let mut conn = timeout(DEADLINE, listeners[0].accept())
        .await
        .expect("accept deadline")
        .expect("accept");
    conn.write_all(b"upgraded").await.expect("write");
    conn.close().await.expect("close conn");
}
