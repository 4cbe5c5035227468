//! In-memory fakes for tests: scripted commands, a static policy export and
//! scripted rules. Nothing here touches the host.

use crate::capture::Capture;
use crate::command::{command_line, CommandOutput, CommandRunner};
use crate::error::RuleError;
use crate::policy::PolicyExporter;
use crate::rule::{Rule, RuleContext};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

enum Matcher {
    Exact(String),
    Prefix(String),
}

impl Matcher {
    fn matches(&self, line: &str) -> bool {
        match self {
            Matcher::Exact(expected) => line == expected,
            Matcher::Prefix(prefix) => line.starts_with(prefix.as_str()),
        }
    }
}

/// Command runner answering from a script keyed by command line.
#[derive(Default)]
pub struct FakeCommandRunner {
    script: Mutex<Vec<(Matcher, Result<CommandOutput, String>)>>,
    calls: Mutex<Vec<String>>,
}

impl FakeCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the exact command line `line` with `output`.
    pub fn respond(&self, line: &str, output: CommandOutput) {
        self.push(Matcher::Exact(line.to_string()), Ok(output));
    }

    /// Answer any command line starting with `prefix` with `output`.
    pub fn respond_prefix(&self, prefix: &str, output: CommandOutput) {
        self.push(Matcher::Prefix(prefix.to_string()), Ok(output));
    }

    /// Make the exact command line `line` fail to spawn.
    pub fn fail(&self, line: &str, detail: &str) {
        self.push(Matcher::Exact(line.to_string()), Err(detail.to_string()));
    }

    /// Command lines received so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn push(&self, matcher: Matcher, answer: Result<CommandOutput, String>) {
        if let Ok(mut script) = self.script.lock() {
            script.push((matcher, answer));
        }
    }
}

#[async_trait]
impl CommandRunner for FakeCommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, RuleError> {
        let line = command_line(program, args);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(line.clone());
        }

        let answer = self.script.lock().ok().and_then(|script| {
            script
                .iter()
                .find(|(matcher, _)| matcher.matches(&line))
                .map(|(_, answer)| answer.clone())
        });

        match answer {
            Some(Ok(output)) => Ok(output),
            Some(Err(detail)) => Err(RuleError::Command {
                command: line,
                detail,
            }),
            None => Err(RuleError::Command {
                command: line,
                detail: "no scripted response".to_string(),
            }),
        }
    }
}

/// Policy exporter returning a fixed blob and counting invocations.
pub struct StaticPolicyExporter {
    answer: Result<String, String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl StaticPolicyExporter {
    pub fn ok(text: &str) -> Self {
        Self {
            answer: Ok(text.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(detail: &str) -> Self {
        Self {
            answer: Err(detail.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep before answering, to widen the window for concurrent callers.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PolicyExporter for StaticPolicyExporter {
    async fn export(&self) -> Result<String, RuleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.answer.clone().map_err(RuleError::PolicyExport)
    }
}

/// Behaviour of a [`ScriptedRule`].
#[derive(Debug, Clone)]
pub enum Script {
    /// Write one PASS line.
    Pass(String),
    /// Write one FAIL line.
    Fail(String),
    /// Write a PASS line followed by a FAIL line.
    Mixed(String, String),
    /// Write a plain note and no marker.
    Silent(String),
    /// Return a rule error.
    Raise(String),
    /// Panic inside evaluate.
    Panic(String),
    /// Sleep, then run the inner script.
    Delay(Duration, Box<Script>),
    /// Read a policy setting and pass when it is present.
    ReadPolicy(String),
}

/// Rule driven by a [`Script`], counting its evaluations.
pub struct ScriptedRule {
    id: String,
    description: String,
    script: Script,
    evaluations: AtomicUsize,
}

impl ScriptedRule {
    pub fn new(id: &str, description: &str, script: Script) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            script,
            evaluations: AtomicUsize::new(0),
        }
    }

    /// Shorthand for an `Arc`-wrapped rule.
    pub fn arc(id: &str, description: &str, script: Script) -> Arc<Self> {
        Arc::new(Self::new(id, description, script))
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::SeqCst)
    }
}

async fn play(script: &Script, ctx: &RuleContext, out: &mut Capture) -> Result<(), RuleError> {
    let mut current = script;
    loop {
        match current {
            Script::Delay(delay, inner) => {
                tokio::time::sleep(*delay).await;
                current = inner.as_ref();
            }
            Script::Pass(line) => {
                out.pass(line);
                return Ok(());
            }
            Script::Fail(line) => {
                out.fail(line);
                return Ok(());
            }
            Script::Mixed(pass, fail) => {
                out.pass(pass);
                out.fail(fail);
                return Ok(());
            }
            Script::Silent(line) => {
                out.note(line);
                return Ok(());
            }
            Script::Raise(detail) => {
                return Err(RuleError::UnexpectedOutput(detail.clone()));
            }
            Script::Panic(msg) => panic!("{}", msg),
            Script::ReadPolicy(key) => {
                return match ctx.policy().setting(key).await? {
                    Some(value) => {
                        out.pass(format!("{key} = {value}"));
                        Ok(())
                    }
                    None => Err(RuleError::PolicySettingMissing(key.clone())),
                };
            }
        }
    }
}

#[async_trait]
impl Rule for ScriptedRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn evaluate(&self, ctx: &RuleContext, out: &mut Capture) -> Result<(), RuleError> {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        play(&self.script, ctx, out).await
    }
}

/// Context wired to fakes: the given runner plus a static export blob.
pub fn fake_context(runner: Arc<FakeCommandRunner>, export: &str) -> RuleContext {
    RuleContext::new(runner, Arc::new(StaticPolicyExporter::ok(export)))
}
