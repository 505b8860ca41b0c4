//! Kernel child process spoken to over JSON-lines stdio.

use std::{collections::VecDeque, process::Stdio};

use mathline_core::{Link, LinkConfig, LinkError, LinkStatus, PacketTag, Token, link::code};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStdin, ChildStdout, Command},
    runtime::Runtime,
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError},
};

use crate::{
    launch::{LaunchCommand, LaunchError},
    protocol::{MessageFrame, PacketFrame},
};

/// What the background tasks report to the link.
#[derive(Debug)]
enum Inbound {
    Packet(PacketFrame),
    Failed { code: i32, message: String },
}

/// A kernel process behind a [`Link`].
///
/// Reading and writing happen on background tasks of a runtime owned by the
/// link; the `Link` methods themselves are synchronous.
pub struct ProcessLink {
    runtime: Runtime,
    child: Option<Child>,
    inbound: UnboundedReceiver<Inbound>,
    outbound: Option<UnboundedSender<MessageFrame>>,
    peeked: Option<PacketFrame>,
    current: VecDeque<Token>,
    building: Vec<Token>,
    status: LinkStatus,
}

impl ProcessLink {
    /// Start the kernel named by `config`.
    ///
    /// # Errors
    /// Returns error if the command is invalid, the executable is missing or
    /// the process cannot be spawned.
    pub fn open(config: &LinkConfig) -> Result<Self, LaunchError> {
        let command = LaunchCommand::from_config(config)?;
        let executable = command.resolve()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("mathline-link")
            .enable_all()
            .build()?;

        let mut child = {
            let _guard = runtime.enter();
            Command::new(&executable)
                .args(&command.args)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit())
                .kill_on_drop(true)
                .spawn()?
        };
        tracing::info!(program = %executable.display(), args = ?command.args, "kernel started");

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("kernel stdin is not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("kernel stdout is not piped"))?;

        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        runtime.spawn(read_loop(stdout, inbound_tx.clone()));
        runtime.spawn(write_loop(stdin, outbound_rx, inbound_tx));

        Ok(Self {
            runtime,
            child: Some(child),
            inbound,
            outbound: Some(outbound),
            peeked: None,
            current: VecDeque::new(),
            building: Vec::new(),
            status: LinkStatus::ok(),
        })
    }

    /// OS process id of the kernel, while it runs.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    fn fail(&mut self, code: i32, message: impl Into<String>) {
        if self.status.is_ok() {
            let message = message.into();
            tracing::warn!(code, %message, "kernel link failed");
            self.status = LinkStatus::failed(code, message);
        }
    }

    fn accept(&mut self, inbound: Inbound) -> Option<PacketFrame> {
        match inbound {
            Inbound::Packet(frame) => Some(frame),
            Inbound::Failed { code, message } => {
                self.fail(code, message);
                None
            }
        }
    }

    fn take_token(&mut self, expected: &'static str) -> Result<Token, LinkError> {
        if self.outbound.is_none() {
            return Err(LinkError::NotConnected);
        }
        self.current.pop_front().ok_or(LinkError::UnexpectedToken {
            expected,
            found: "nothing",
        })
    }

    fn writer(&self) -> Result<&UnboundedSender<MessageFrame>, LinkError> {
        self.outbound.as_ref().ok_or(LinkError::NotConnected)
    }
}

impl Link for ProcessLink {
    fn activate(&mut self) -> bool {
        let exited = self
            .child
            .as_mut()
            .map(Child::try_wait)
            .transpose()
            .map(Option::flatten);
        match exited {
            Ok(None) => self.status.is_ok(),
            Ok(Some(status)) => {
                self.fail(code::CONNECT, format!("kernel exited during startup ({status})"));
                false
            }
            Err(err) => {
                self.fail(code::CONNECT, err.to_string());
                false
            }
        }
    }

    fn is_ready(&mut self) -> bool {
        if self.peeked.is_some() {
            return true;
        }
        if !self.status.is_ok() {
            return false;
        }
        match self.inbound.try_recv() {
            Ok(inbound) => {
                self.peeked = self.accept(inbound);
                self.peeked.is_some()
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                self.fail(code::CLOSED, "kernel closed the link");
                false
            }
        }
    }

    fn flush(&mut self) -> bool {
        self.status.is_ok()
    }

    fn new_packet(&mut self) -> bool {
        self.current.clear();
        self.outbound.is_some()
    }

    fn next_packet(&mut self) -> PacketTag {
        self.current.clear();
        let frame = match self.peeked.take() {
            Some(frame) => Some(frame),
            None if !self.status.is_ok() => None,
            None => match self.runtime.block_on(self.inbound.recv()) {
                Some(inbound) => self.accept(inbound),
                None => {
                    self.fail(code::CLOSED, "kernel closed the link");
                    None
                }
            },
        };

        match frame {
            Some(PacketFrame { packet, args }) => {
                tracing::trace!(%packet, items = args.len(), "packet received");
                self.current = args.into();
                packet
            }
            None => PacketTag::Illegal,
        }
    }

    fn get_string(&mut self) -> Result<String, LinkError> {
        match self.take_token("string")? {
            Token::String(text) => Ok(text),
            other => Err(LinkError::UnexpectedToken {
                expected: "string",
                found: other.kind(),
            }),
        }
    }

    fn get_symbol(&mut self) -> Result<String, LinkError> {
        match self.take_token("symbol")? {
            Token::Symbol(name) => Ok(name),
            other => Err(LinkError::UnexpectedToken {
                expected: "symbol",
                found: other.kind(),
            }),
        }
    }

    fn get_integer(&mut self) -> Result<i32, LinkError> {
        match self.take_token("integer")? {
            Token::Integer(value) => Ok(value),
            other => Err(LinkError::UnexpectedToken {
                expected: "integer",
                found: other.kind(),
            }),
        }
    }

    fn put_function(&mut self, name: &str, arity: usize) -> Result<(), LinkError> {
        self.writer()?;
        self.building.push(Token::function(name, arity));
        Ok(())
    }

    fn put_string(&mut self, text: &str) -> Result<(), LinkError> {
        self.writer()?;
        self.building.push(Token::string(text));
        Ok(())
    }

    fn end_message(&mut self) -> Result<(), LinkError> {
        let frame = MessageFrame::new(std::mem::take(&mut self.building));
        if self.writer()?.send(frame).is_err() {
            self.fail(code::CLOSED, "kernel stopped accepting input");
            return Err(LinkError::Closed);
        }
        Ok(())
    }

    fn last_error(&mut self) -> LinkStatus {
        self.status.clone()
    }

    fn close(&mut self) {
        self.outbound = None;
        self.peeked = None;
        self.current.clear();
        if let Some(mut child) = self.child.take() {
            if let Err(err) = child.start_kill() {
                tracing::debug!(error = %err, "kernel already gone");
            }
            let _guard = self.runtime.enter();
            drop(child);
        }
    }
}

impl Drop for ProcessLink {
    fn drop(&mut self) {
        self.close();
    }
}

async fn read_loop(stdout: ChildStdout, inbound: UnboundedSender<Inbound>) {
    let mut reader = BufReader::new(stdout);
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let failure = match reader.read_line(&mut buffer).await {
            Ok(0) => Inbound::Failed {
                code: code::CLOSED,
                message: "kernel closed the link".to_string(),
            },
            Ok(_) => match PacketFrame::decode(&buffer) {
                Ok(Some(frame)) => {
                    if inbound.send(Inbound::Packet(frame)).is_err() {
                        break;
                    }
                    continue;
                }
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!("Undecodable kernel frame: {}", e);
                    Inbound::Failed {
                        code: code::BAD_DATA,
                        message: format!("undecodable frame from kernel: {e}"),
                    }
                }
            },
            Err(e) => Inbound::Failed {
                code: code::DEAD,
                message: format!("error reading from kernel: {e}"),
            },
        };
        let _ = inbound.send(failure);
        break;
    }
}

async fn write_loop(
    mut stdin: ChildStdin,
    mut outbound: UnboundedReceiver<MessageFrame>,
    inbound: UnboundedSender<Inbound>,
) {
    while let Some(frame) = outbound.recv().await {
        let written = match frame.encode() {
            Ok(line) => async {
                stdin.write_all(line.as_bytes()).await?;
                stdin.flush().await
            }
            .await
            .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(message) = written {
            tracing::error!("Error writing to kernel: {}", message);
            let _ = inbound.send(Inbound::Failed {
                code: code::DEAD,
                message: format!("error writing to kernel: {message}"),
            });
            break;
        }
    }
}
