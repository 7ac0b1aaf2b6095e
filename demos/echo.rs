//! # Demo: echo
//!
//! Echo server that survives restarts without dropping connections.
//!
//! Demonstrates how to:
//! - Adopt sockets from a predecessor with [`Supervisor::inherit`], or bind on a cold start.
//! - Serve [`Conn`]s and close them so drains can finish.
//! - Ask the predecessor to drain once ready with [`Supervisor::close_parent`].
//! - Hand the registry to [`Supervisor::run`] for signal-driven drain/restart.
//!
//! ## Flow
//! ```text
//! cargo run --example echo
//!     ├─► inherit() ── NotInheriting ─► bind 127.0.0.1:7007
//!     ├─► accept loop ─► echo lines until EOF ─► conn.close()
//!     └─► run(registry)
//!
//! kill -USR2 <pid>   ─► successor spawned with the socket at fd 3
//!                       successor: inherit() ─► close_parent() ─► SIGTERM to us
//! SIGTERM            ─► drain: wait for open echo sessions, then exit
//! ```
//!
//! ## Try it
//! ```bash
//! RUST_LOG=sockvisor=debug cargo run --example echo
//! nc 127.0.0.1 7007          # keep a session open
//! kill -USR2 <pid>           # old process drains after the session ends
//! ```

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use sockvisor::{
    Config, Conn, Listener, ListenerRef, LogWriter, Subscribe, Supervisor, TcpTransport,
};

const ADDR: &str = "127.0.0.1:7007";

async fn echo(mut conn: Conn<tokio::net::TcpStream>) -> std::io::Result<()> {
    let (rd, mut wr) = conn.split();
    let mut lines = BufReader::new(rd).lines();
    while let Some(line) = lines.next_line().await? {
        wr.write_all(line.as_bytes()).await?;
        wr.write_all(b"\n").await?;
    }
    conn.close().await
}

fn serve(listener: Arc<Listener<TcpTransport>>) {
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok(conn) => {
                    tokio::spawn(async move {
                        if let Err(e) = echo(conn).await {
                            tracing::warn!(error = %e, "echo session failed");
                        }
                    });
                }
                Err(e) if e.is_closed() => break,
                Err(e) => tracing::warn!(error = %e, "accept failed"),
            }
        }
    });
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sockvisor=info".into()),
        )
        .init();

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let sup = Supervisor::builder(Config::default())
        .with_subscribers(subs)
        .build();

    let listeners = match sup.inherit() {
        Ok(inherited) => inherited,
        Err(e) if e.is_cold_start() => vec![sup.listen(TcpTransport::bind(ADDR).await?)],
        Err(e) => return Err(e.into()),
    };
    println!("[echo] pid {} serving {} listener(s)", std::process::id(), listeners.len());

    for l in &listeners {
        serve(Arc::clone(l));
    }
    sup.close_parent()?;

    let registry: Vec<ListenerRef> = listeners.into_iter().map(|l| l as ListenerRef).collect();
    sup.run(registry).await?;
    println!("[echo] drained, bye");
    Ok(())
}
