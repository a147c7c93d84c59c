//! Interactive terminal session.
//!
//! One loop reads input lines and worker events. Plain text is sent to the
//! current model as a chat message; lines starting with `/` are commands
//! (see [`SessionCommand`]). Chat, ask and ingest run in the background via
//! the [`Dispatcher`]; at most one inference task and one ingest task run
//! at a time. Conversation history is only written from this loop.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use orinda_core::models::{ConversationRecord, ModelSelection, Role};
use orinda_core::prompt::relevance_percent;
use orinda_core::OrindaError;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::context::AppContext;
use crate::ingest::IngestSummary;
use crate::progress::format_number;
use crate::worker::{Dispatcher, TaskHandle, TaskId, WorkerEvent};

#[derive(Debug, Parser)]
#[command(multicall = true)]
struct Repl {
    #[command(subcommand)]
    command: SessionCommand,
}

/// Commands typed after a leading `/`.
#[derive(Debug, Subcommand, PartialEq)]
pub enum SessionCommand {
    /// Answer from the knowledge base
    Ask {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        query: Vec<String>,
    },
    /// Add files or folders to the knowledge base
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// List ingested files
    Sources,
    /// Remove an ingested file from the knowledge base
    Forget {
        #[arg(required = true, trailing_var_arg = true)]
        file: Vec<String>,
    },
    /// Show or change the chat model
    Model { name: Option<String> },
    /// List available chat models
    Models,
    /// Save the current conversation
    Save {
        #[arg(trailing_var_arg = true)]
        title: Vec<String>,
    },
    /// Start a new conversation
    New,
    /// List saved conversations
    History,
    /// Open a saved conversation
    Load { id: String },
    /// Delete a saved conversation
    Delete { id: String },
    /// Print the current conversation
    Show,
    /// Cancel running background work
    Cancel,
    /// Leave the session
    #[command(alias = "exit")]
    Quit,
}

/// Parse a `/command` line (without the slash).
pub fn parse_command(line: &str) -> Result<SessionCommand, clap::Error> {
    Repl::try_parse_from(split_args(line)).map(|r| r.command)
}

/// Whitespace split that keeps double-quoted runs together, so paths with
/// spaces can be passed as `"/docs/My File.pdf"`.
fn split_args(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;
    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        args.push(current);
    }
    args
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Session<W: Write> {
    ctx: Arc<AppContext>,
    dispatcher: Dispatcher,
    events: UnboundedReceiver<WorkerEvent>,
    out: W,
    interactive: bool,
    model: ModelSelection,
    conversation: ConversationRecord,
    inference_task: Option<TaskHandle>,
    ingest_task: Option<TaskHandle>,
}

impl<W: Write> Session<W> {
    pub fn new(ctx: Arc<AppContext>, out: W) -> Result<Self> {
        let model = ctx.default_model()?;
        let (dispatcher, events) = Dispatcher::new(ctx.clone());
        Ok(Self {
            ctx,
            dispatcher,
            events,
            out,
            interactive: false,
            model,
            conversation: ConversationRecord::new(""),
            inference_task: None,
            ingest_task: None,
        })
    }

    /// Print a `> ` prompt before each read.
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn conversation(&self) -> &ConversationRecord {
        &self.conversation
    }

    pub fn model(&self) -> &ModelSelection {
        &self.model
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// True when no background task is outstanding.
    pub fn is_idle(&self) -> bool {
        self.inference_task.is_none() && self.ingest_task.is_none()
    }

    /// Run until `/quit` or end of input. At end of input, outstanding
    /// tasks are waited for before returning. A line that is not UTF-8 is
    /// reported and skipped.
    pub async fn run<R: AsyncBufRead + Unpin>(&mut self, mut input: R) -> Result<()> {
        let mut buf = Vec::new();
        writeln!(
            self.out,
            "Orinda ready. Model: {}. Type /help for commands.",
            self.model
        )?;

        loop {
            if self.interactive {
                write!(self.out, "> ")?;
                self.out.flush()?;
            }
            tokio::select! {
                read = input.read_until(b'\n', &mut buf) => {
                    if read? == 0 && buf.is_empty() {
                        break;
                    }
                    match String::from_utf8(std::mem::take(&mut buf)) {
                        Ok(line) => {
                            if self.handle_line(&line).await? == Flow::Quit {
                                self.cancel_all();
                                return Ok(());
                            }
                        }
                        Err(_) => writeln!(self.out, "Error: input is not valid UTF-8")?,
                    }
                }
                Some(event) = self.events.recv() => self.handle_event(event)?,
            }
        }

        self.wait_idle().await
    }

    /// Process worker events until every background task has finished.
    pub async fn wait_idle(&mut self) -> Result<()> {
        while !self.is_idle() {
            match self.events.recv().await {
                Some(event) => self.handle_event(event)?,
                None => break,
            }
        }
        Ok(())
    }

    pub async fn handle_line(&mut self, line: &str) -> Result<Flow> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Flow::Continue);
        }
        let Some(command_line) = line.strip_prefix('/') else {
            self.start_chat(line.to_string())?;
            return Ok(Flow::Continue);
        };

        let command = match parse_command(command_line) {
            Ok(command) => command,
            Err(e) => {
                write!(self.out, "{}", e.render())?;
                return Ok(Flow::Continue);
            }
        };
        self.execute(command).await
    }

    async fn execute(&mut self, command: SessionCommand) -> Result<Flow> {
        match command {
            SessionCommand::Ask { query } => self.start_ask(query.join(" "))?,
            SessionCommand::Ingest { paths } => self.start_ingest(paths)?,
            SessionCommand::Sources => self.show_sources().await?,
            SessionCommand::Forget { file } => self.forget(&file.join(" ")).await?,
            SessionCommand::Model { name: None } => {
                writeln!(self.out, "Current model: {}", self.model)?;
            }
            SessionCommand::Model { name: Some(name) } => self.switch_model(&name)?,
            SessionCommand::Models => {
                for name in &self.ctx.config.inference.models {
                    let marker = if *name == self.model.name { "*" } else { " " };
                    writeln!(self.out, "{} {}", marker, name)?;
                }
            }
            SessionCommand::Save { title } => self.save(&title.join(" ")).await?,
            SessionCommand::New => {
                self.conversation = ConversationRecord::new("");
                writeln!(self.out, "Started a new conversation.")?;
            }
            SessionCommand::History => self.show_history().await?,
            SessionCommand::Load { id } => self.load(&id).await?,
            SessionCommand::Delete { id } => self.delete(&id).await?,
            SessionCommand::Show => {
                if self.conversation.is_empty() {
                    writeln!(self.out, "(empty conversation)")?;
                } else {
                    writeln!(self.out, "{}", self.conversation.transcript())?;
                }
            }
            SessionCommand::Cancel => {
                if self.is_idle() {
                    writeln!(self.out, "Nothing to cancel.")?;
                } else {
                    self.cancel_all();
                    writeln!(self.out, "Cancelled.")?;
                }
            }
            SessionCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn inference_busy(&mut self) -> Result<bool> {
        if self.inference_task.is_some() {
            writeln!(
                self.out,
                "Still waiting for the previous reply. Use /cancel to stop it."
            )?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Switching to a different model starts a fresh conversation.
    fn switch_model(&mut self, name: &str) -> Result<()> {
        if self.inference_busy()? {
            return Ok(());
        }
        match self.ctx.select_model(name) {
            Ok(model) if model == self.model => {
                writeln!(self.out, "Already using {}", self.model)?;
            }
            Ok(model) => {
                self.model = model;
                self.conversation = ConversationRecord::new("");
                writeln!(
                    self.out,
                    "Model set to {}. Started a new conversation.",
                    self.model
                )?;
            }
            Err(e) => self.report_error(&e)?,
        }
        Ok(())
    }

    fn start_chat(&mut self, text: String) -> Result<()> {
        if self.inference_busy()? {
            return Ok(());
        }
        writeln!(self.out, "(thinking with {}...)", self.model)?;
        self.inference_task = Some(self.dispatcher.spawn_chat(text, self.model.clone()));
        Ok(())
    }

    fn start_ask(&mut self, query: String) -> Result<()> {
        if self.inference_busy()? {
            return Ok(());
        }
        writeln!(self.out, "(searching the knowledge base...)")?;
        self.inference_task = Some(self.dispatcher.spawn_ask(query, self.model.clone()));
        Ok(())
    }

    fn start_ingest(&mut self, paths: Vec<PathBuf>) -> Result<()> {
        if self.ingest_task.is_some() {
            writeln!(
                self.out,
                "An ingestion is already running. Use /cancel to stop it."
            )?;
            return Ok(());
        }
        self.ingest_task = Some(self.dispatcher.spawn_ingest(paths));
        Ok(())
    }

    fn cancel_all(&mut self) {
        for handle in [self.inference_task.take(), self.ingest_task.take()]
            .into_iter()
            .flatten()
        {
            tracing::info!(task = handle.id, "cancelling task");
            handle.abort();
        }
    }

    fn is_current(slot: &Option<TaskHandle>, task: TaskId) -> bool {
        slot.as_ref().is_some_and(|h| h.id == task)
    }

    /// Apply one worker event. Events from cancelled or superseded tasks
    /// are ignored.
    pub fn handle_event(&mut self, event: WorkerEvent) -> Result<()> {
        let task = event.task();
        match event {
            WorkerEvent::Chat { prompt, result, .. } => {
                if !Self::is_current(&self.inference_task, task) {
                    tracing::debug!(task, "ignoring stale chat result");
                    return Ok(());
                }
                self.inference_task = None;
                match result {
                    Ok(reply) => {
                        self.conversation.push(Role::User, prompt);
                        self.conversation.push(Role::Assistant, reply.clone());
                        writeln!(self.out, "{}: {}", Role::Assistant.label(), reply)?;
                    }
                    Err(e) => self.report_error(&e)?,
                }
            }
            WorkerEvent::Ask { query, result, .. } => {
                if !Self::is_current(&self.inference_task, task) {
                    tracing::debug!(task, "ignoring stale ask result");
                    return Ok(());
                }
                self.inference_task = None;
                match result {
                    Ok(answer) => {
                        self.conversation.push(Role::User, query);
                        self.conversation.push(Role::Assistant, answer.text.clone());
                        writeln!(self.out, "{}: {}", Role::Assistant.label(), answer.text)?;
                        if answer.sources.is_empty() {
                            writeln!(self.out, "(no matching documents in the knowledge base)")?;
                        } else {
                            writeln!(self.out, "Sources:")?;
                            for r in &answer.sources {
                                writeln!(
                                    self.out,
                                    "  [{}, Relevance: {}%]",
                                    r.chunk.source_file,
                                    relevance_percent(r.score)
                                )?;
                            }
                        }
                    }
                    Err(e) => self.report_error(&e)?,
                }
            }
            WorkerEvent::IngestProgress { event, .. } => {
                if Self::is_current(&self.ingest_task, task) {
                    writeln!(self.out, "{}", event.describe())?;
                }
            }
            WorkerEvent::IngestDone { summary, .. } => {
                if !Self::is_current(&self.ingest_task, task) {
                    tracing::debug!(task, "ignoring stale ingest result");
                    return Ok(());
                }
                self.ingest_task = None;
                self.report_ingest(&summary)?;
            }
        }
        Ok(())
    }

    fn report_ingest(&mut self, summary: &IngestSummary) -> Result<()> {
        for failure in &summary.failures {
            writeln!(self.out, "Error: {}", failure)?;
        }
        if let Some(failure) = summary.failures.iter().find(|f| f.cause.is_unavailable()) {
            self.hint_unavailable(&failure.cause)?;
        }
        writeln!(
            self.out,
            "Ingested {} chunk(s) from {} file(s), {} failed.",
            format_number(summary.total_chunks() as u64),
            summary.ingested.len(),
            summary.failures.len()
        )?;
        Ok(())
    }

    fn report_error(&mut self, e: &OrindaError) -> Result<()> {
        tracing::warn!(error = %e, "request failed");
        writeln!(self.out, "Error: {}", e)?;
        self.hint_unavailable(e)
    }

    fn hint_unavailable(&mut self, e: &OrindaError) -> Result<()> {
        let url = match e {
            OrindaError::EmbeddingUnavailable(_) => &self.ctx.config.embedding.url,
            _ if e.is_unavailable() => &self.ctx.config.inference.url,
            _ => return Ok(()),
        };
        writeln!(self.out, "(is the Ollama server running at {}?)", url)?;
        Ok(())
    }

    async fn show_sources(&mut self) -> Result<()> {
        match self.ctx.store().sources().await {
            Ok(sources) if sources.is_empty() => {
                writeln!(self.out, "No documents ingested yet.")?;
            }
            Ok(sources) => {
                for s in sources {
                    writeln!(
                        self.out,
                        "{}  ({} chunks)",
                        s.source_file,
                        format_number(s.chunk_count as u64)
                    )?;
                }
            }
            Err(e) => self.report_error(&e)?,
        }
        Ok(())
    }

    async fn forget(&mut self, file: &str) -> Result<()> {
        if self.ingest_task.is_some() {
            writeln!(self.out, "Wait for the running ingestion to finish first.")?;
            return Ok(());
        }
        match self.ctx.ingestor().forget(file).await {
            Ok(0) => writeln!(self.out, "No chunks stored for {}.", file)?,
            Ok(n) => writeln!(self.out, "Removed {} chunk(s) of {}.", n, file)?,
            Err(e) => self.report_error(&e)?,
        }
        Ok(())
    }

    async fn save(&mut self, title: &str) -> Result<()> {
        if self.conversation.is_empty() {
            writeln!(self.out, "Nothing to save yet.")?;
            return Ok(());
        }
        if !title.trim().is_empty() {
            self.conversation.set_title(title);
        }
        match self.ctx.conversations().save(&self.conversation).await {
            Ok(written) => writeln!(
                self.out,
                "Saved \"{}\" ({}), {} new turn(s).",
                self.conversation.title, self.conversation.id, written
            )?,
            Err(e) => self.report_error(&e)?,
        }
        Ok(())
    }

    async fn show_history(&mut self) -> Result<()> {
        match self.ctx.conversations().list().await {
            Ok(list) if list.is_empty() => writeln!(self.out, "No saved conversations.")?,
            Ok(list) => {
                for c in list {
                    writeln!(
                        self.out,
                        "{}  {}  {}  ({} turns)",
                        &c.id[..8.min(c.id.len())],
                        c.created_at.format("%Y-%m-%d %H:%M"),
                        c.title,
                        c.turn_count
                    )?;
                }
            }
            Err(e) => self.report_error(&e)?,
        }
        Ok(())
    }

    async fn resolve(&mut self, prefix: &str) -> Result<Option<String>> {
        match self.ctx.conversations().resolve_id(prefix).await {
            Ok(Some(id)) => Ok(Some(id)),
            Ok(None) => {
                writeln!(self.out, "No saved conversation matches {}.", prefix)?;
                Ok(None)
            }
            Err(e) => {
                self.report_error(&e)?;
                Ok(None)
            }
        }
    }

    async fn load(&mut self, prefix: &str) -> Result<()> {
        let Some(id) = self.resolve(prefix).await? else {
            return Ok(());
        };
        match self.ctx.conversations().get(&id).await {
            Ok(Some(record)) => {
                self.conversation = record;
                writeln!(self.out, "Loaded \"{}\".", self.conversation.title)?;
                if !self.conversation.is_empty() {
                    writeln!(self.out, "{}", self.conversation.transcript())?;
                }
            }
            Ok(None) => writeln!(self.out, "No saved conversation matches {}.", prefix)?,
            Err(e) => self.report_error(&e)?,
        }
        Ok(())
    }

    async fn delete(&mut self, prefix: &str) -> Result<()> {
        let Some(id) = self.resolve(prefix).await? else {
            return Ok(());
        };
        match self.ctx.conversations().delete(&id).await {
            Ok(true) => {
                writeln!(self.out, "Deleted conversation {}.", id)?;
                if self.conversation.id == id {
                    self.conversation = ConversationRecord::new("");
                }
            }
            Ok(false) => writeln!(self.out, "No saved conversation matches {}.", prefix)?,
            Err(e) => self.report_error(&e)?,
        }
        Ok(())
    }
}
