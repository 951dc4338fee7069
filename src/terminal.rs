use std::{
    io::{self, Read, Write},
    sync::{Arc, Mutex},
    thread,
};

use anyhow::{Context, Result};
use portable_pty::{CommandBuilder, MasterPty, NativePtySystem, PtySize, PtySystem};
use tracing::{debug, info, warn};
use uuid::Uuid;

const TERMINAL_NAME: &str = "Genie Terminal";

// Notification that a session ended, carrying the closed session's identity.
pub type OnClosed = Arc<dyn Fn(Uuid) + Send + Sync>;

// Host terminal boundary: create a named interactive session, surface it,
// inject input. The manager below is the only owner of live handles.
pub trait TerminalHost: Send + Sync {
    fn create(&self, name: &str, on_closed: OnClosed) -> Result<Box<dyn SessionHandle>>;
}

pub trait SessionHandle: Send {
    fn id(&self) -> Uuid;
    fn show(&self);
    fn send_text(&mut self, text: &str) -> Result<()>;
}

type Holder = Arc<Mutex<Option<Box<dyn SessionHandle>>>>;

// At most one live session, created lazily and reused until the host reports
// it closed. The close notification and the command path are the only two
// writers of the holder; the mutex covers the PTY pump running on a real
// thread.
#[derive(Clone)]
pub struct TerminalManager {
    host: Arc<dyn TerminalHost>,
    live: Holder,
}

impl TerminalManager {
    pub fn new(host: Arc<dyn TerminalHost>) -> Self {
        Self {
            host,
            live: Arc::new(Mutex::new(None)),
        }
    }

    // Runs `f` against the live session, creating one first if needed.
    fn with_session<T>(&self, f: impl FnOnce(&mut dyn SessionHandle) -> Result<T>) -> Result<T> {
        let mut live = self.live.lock().unwrap();
        if live.is_none() {
            let holder = self.live.clone();
            let on_closed: OnClosed = Arc::new(move |id| clear_if_matches(&holder, id));
            let session = self.host.create(TERMINAL_NAME, on_closed)?;
            info!(session = %session.id(), "created terminal session");
            *live = Some(session);
        }
        f(live.as_mut().unwrap().as_mut())
    }

    pub fn invalidate_if_matches(&self, closed: Uuid) {
        clear_if_matches(&self.live, closed);
    }

    pub fn current_session_id(&self) -> Option<Uuid> {
        self.live.lock().unwrap().as_ref().map(|s| s.id())
    }
}

fn clear_if_matches(live: &Mutex<Option<Box<dyn SessionHandle>>>, closed: Uuid) {
    let mut live = live.lock().unwrap();
    if live.as_ref().map(|s| s.id()) == Some(closed) {
        debug!(session = %closed, "terminal session closed, dropping handle");
        *live = None;
    }
}

// Translates one run-command into terminal input. Errors stop here: a dead
// shell must not take the dispatch loop with it.
#[derive(Clone)]
pub struct CommandRunner {
    terminal: TerminalManager,
}

impl CommandRunner {
    pub fn new(terminal: TerminalManager) -> Self {
        Self { terminal }
    }

    pub fn run(&self, shell_command: &str) {
        let text = rewrite_chaining(shell_command);
        let result = self.terminal.with_session(|session| {
            session.show();
            session.send_text(&text)
        });
        if let Err(err) = result {
            warn!(error = %err, "failed to run shell command");
        }
    }
}

// `&&` does not survive the line-injection boundary reliably, `;` does.
fn rewrite_chaining(shell_command: &str) -> String {
    let mut text = shell_command.replace("&&", ";");
    text.push('\n');
    text
}

// Real host: one PTY running the user's shell. Output is pumped to our own
// stdout so the operator sees the session; reader EOF means the shell died
// and the manager gets told.
pub struct PtyTerminalHost;

struct PtySession {
    id: Uuid,
    name: String,
    writer: Box<dyn Write + Send>,
    // Dropping the master tears the session down, keep it alive.
    _master: Box<dyn MasterPty + Send>,
}

impl TerminalHost for PtyTerminalHost {
    fn create(&self, name: &str, on_closed: OnClosed) -> Result<Box<dyn SessionHandle>> {
        let pty_system = NativePtySystem::default();
        let pair = pty_system
            .openpty(PtySize {
                rows: 24,
                cols: 120,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("failed to open pty")?;

        #[cfg(target_os = "windows")]
        let cmd = CommandBuilder::new("cmd");
        #[cfg(not(target_os = "windows"))]
        let cmd = {
            let shell = std::env::var("SHELL").unwrap_or_else(|_| "bash".into());
            CommandBuilder::new(shell)
        };

        let mut child = pair
            .slave
            .spawn_command(cmd)
            .context("failed to spawn shell")?;
        drop(pair.slave);

        let mut reader = pair
            .master
            .try_clone_reader()
            .context("failed to attach pty reader")?;
        let writer = pair.master.take_writer().context("failed to attach pty writer")?;

        let id = Uuid::new_v4();

        // Pump: PTY -> our stdout. Exits on EOF or read error, which is how
        // we learn the session ended.
        thread::spawn(move || {
            let mut buf = [0u8; 1024];
            let mut stdout = io::stdout();
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if stdout.write_all(&buf[..n]).is_err() {
                            break;
                        }
                        let _ = stdout.flush();
                    }
                    Err(_) => break,
                }
            }
            let _ = child.wait();
            on_closed(id);
        });

        Ok(Box::new(PtySession {
            id,
            name: name.to_string(),
            writer,
            _master: pair.master,
        }))
    }
}

impl SessionHandle for PtySession {
    fn id(&self) -> Uuid {
        self.id
    }

    fn show(&self) {
        // Headless bridge: there is no window to raise.
        debug!(session = %self.id, name = %self.name, "terminal surfaced");
    }

    fn send_text(&mut self, text: &str) -> Result<()> {
        self.writer
            .write_all(text.as_bytes())
            .context("failed to write to pty")?;
        self.writer.flush().context("failed to flush pty writer")?;
        Ok(())
    }
}
