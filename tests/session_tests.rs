//! Conversation behavior against a scripted transport.

use std::collections::VecDeque;
use std::sync::Mutex;

use futures::StreamExt;
use futures::stream;
use tokio_test::{assert_err, assert_ok};

use parley::chat::{ChatSession, EmptyResponsePolicy, Renderer, ReplyStatus};
use parley::types::{Role, Turn};
use parley::{Error, FailureKind, FragmentStream, Transport};

const SYSTEM: &str = "You are a calculator.";

/// Plays back one script per `complete` call and records what it was sent.
#[derive(Default)]
struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<Vec<Turn>>>,
}

enum Script {
    Fragments(Vec<Result<String, Error>>),
    Hang(Vec<String>),
}

impl ScriptedTransport {
    fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            requests: Mutex::default(),
        }
    }

    fn requests(&self) -> Vec<Vec<Turn>> {
        self.requests.lock().unwrap().clone()
    }
}

fn ok(fragments: &[&str]) -> Script {
    Script::Fragments(fragments.iter().map(|f| Ok(f.to_string())).collect())
}

fn fail_after(fragments: &[&str], err: Error) -> Script {
    let mut items: Vec<Result<String, Error>> =
        fragments.iter().map(|f| Ok(f.to_string())).collect();
    items.push(Err(err));
    Script::Fragments(items)
}

impl Transport for ScriptedTransport {
    fn complete(&self, turns: &[Turn]) -> FragmentStream {
        self.requests.lock().unwrap().push(turns.to_vec());
        match self.scripts.lock().unwrap().pop_front() {
            Some(Script::Fragments(items)) => Box::pin(stream::iter(items)),
            Some(Script::Hang(fragments)) => Box::pin(
                stream::iter(fragments.into_iter().map(Ok)).chain(stream::pending()),
            ),
            None => Box::pin(stream::iter(vec![Err(Error::connection(
                "no script left",
                None,
            ))])),
        }
    }
}

/// Records renderer calls as short strings.
#[derive(Default)]
struct RecordingRenderer {
    events: Vec<String>,
    interrupt_after: Option<usize>,
    fragments: usize,
}

impl Renderer for RecordingRenderer {
    fn start_reply(&mut self, label: &str) {
        self.events.push(format!("start:{label}"));
    }

    fn print_fragment(&mut self, text: &str) {
        self.fragments += 1;
        self.events.push(format!("fragment:{text}"));
    }

    fn finish_reply(&mut self, label: &str, text: &str) {
        self.events.push(format!("finish:{label}:{text}"));
    }

    fn cancel_reply(&mut self) {
        self.events.push("cancel".to_string());
    }

    fn print_no_response(&mut self) {
        self.events.push("no-response".to_string());
    }

    fn print_error(&mut self, error: &str) {
        self.events.push(format!("error:{error}"));
    }

    fn print_info(&mut self, info: &str) {
        self.events.push(format!("info:{info}"));
    }

    fn print_interrupted(&mut self) {
        self.events.push("interrupted".to_string());
    }

    fn should_interrupt(&self) -> bool {
        self.interrupt_after.is_some_and(|n| self.fragments >= n)
    }
}

fn assert_alternates(history: &[Turn]) {
    assert_eq!(history[0].role(), Role::System);
    for (i, turn) in history.iter().enumerate().skip(1) {
        let expected = if i % 2 == 1 { Role::User } else { Role::Assistant };
        assert_eq!(turn.role(), expected, "turn {i}");
    }
}

#[tokio::test]
async fn two_plus_two() {
    let mut session = ChatSession::new(ScriptedTransport::new([ok(&["[Assist", "ant]: 4"])]), SYSTEM);

    let mut reply = session.submit("2+2?").unwrap();
    let mut fragments = Vec::new();
    while let Some(fragment) = reply.next().await {
        fragments.push(fragment.unwrap());
    }
    assert_eq!(fragments, vec!["[Assist", "ant]: 4"]);
    assert_eq!(reply.status(), ReplyStatus::Completed);
    assert_eq!(reply.text(), "[Assistant]: 4");
    drop(reply);

    assert_eq!(
        session.history(),
        &[
            Turn::system(SYSTEM),
            Turn::user("2+2?"),
            Turn::assistant("[Assistant]: 4"),
        ]
    );
    assert_eq!(
        session.transport().requests(),
        vec![vec![Turn::system(SYSTEM), Turn::user("2+2?")]]
    );
}

#[tokio::test]
async fn history_grows_by_two_per_exchange() {
    let scripts = (0..5).map(|i| ok(&["answer ", &i.to_string()]));
    let mut session = ChatSession::new(ScriptedTransport::new(scripts), SYSTEM);

    for n in 1..=5 {
        let status = assert_ok!(session.submit(&format!("question {n}")).unwrap().finish().await);
        assert_eq!(status, ReplyStatus::Completed);
        assert_eq!(session.turn_count(), 1 + 2 * n);
        assert_alternates(session.history());
    }

    let requests = session.transport().requests();
    assert_eq!(requests.len(), 5);
    for (i, request) in requests.iter().enumerate() {
        assert_eq!(request.len(), 2 * i + 2);
        assert_eq!(request.last(), Some(&Turn::user(format!("question {}", i + 1))));
    }
    assert_eq!(session.stats().exchanges, 5);
}

#[tokio::test]
async fn committed_text_is_concatenation_of_fragments() {
    let pieces = ["Hel", "lo, ", "wör", "ld", "!"];
    let mut session = ChatSession::new(ScriptedTransport::new([ok(&pieces)]), SYSTEM);
    let collected: Vec<String> = session
        .submit("greet")
        .unwrap()
        .map(|f| f.unwrap())
        .collect()
        .await;
    assert_eq!(collected.concat(), pieces.concat());
    assert_eq!(session.history()[2], Turn::assistant(pieces.concat()));
}

#[tokio::test]
async fn authentication_failure_rolls_back_then_reset() {
    let mut session = ChatSession::new(
        ScriptedTransport::new([fail_after(&[], Error::authentication("Invalid API key"))]),
        SYSTEM,
    );

    let mut reply = session.submit("hello").unwrap();
    let err = reply.next().await.unwrap().unwrap_err();
    assert!(err.is_authentication());
    assert_eq!(
        reply.status(),
        ReplyStatus::Failed(FailureKind::Authentication)
    );
    assert!(reply.next().await.is_none());
    drop(reply);

    assert_eq!(session.history(), &[Turn::system(SYSTEM)]);
    session.reset();
    assert_eq!(session.history(), &[Turn::system(SYSTEM)]);
    assert_eq!(session.stats().failed, 1);
}

#[tokio::test]
async fn transport_failure_mid_stream_discards_partial_text() {
    let mut session = ChatSession::new(
        ScriptedTransport::new([
            ok(&["first answer"]),
            fail_after(&["partial"], Error::streaming("connection reset", None)),
            ok(&["third answer"]),
        ]),
        SYSTEM,
    );
    assert_ok!(session.submit("one").unwrap().finish().await);
    let before = session.history().to_vec();

    let err = assert_err!(session.submit("two").unwrap().finish().await);
    assert_eq!(err.failure_kind(), FailureKind::Transport);
    assert_eq!(session.history(), before.as_slice());

    let status = assert_ok!(session.submit("three").unwrap().finish().await);
    assert_eq!(status, ReplyStatus::Completed);
    assert_eq!(
        session.transport().requests()[2],
        vec![
            Turn::system(SYSTEM),
            Turn::user("one"),
            Turn::assistant("first answer"),
            Turn::user("three"),
        ]
    );
    assert_alternates(session.history());
}

#[tokio::test]
async fn empty_reply_retains_user_turn_by_default() {
    let mut session = ChatSession::new(ScriptedTransport::new([ok(&[])]), SYSTEM);
    let status = assert_ok!(session.submit("anyone there?").unwrap().finish().await);
    assert_eq!(status, ReplyStatus::Empty);
    assert_eq!(status.failure_kind(), Some(FailureKind::EmptyResponse));
    assert_eq!(
        session.history(),
        &[Turn::system(SYSTEM), Turn::user("anyone there?")]
    );
    let stats = session.stats();
    assert_eq!(stats.empty, 1);
    assert!(stats.awaiting_reply);
}

#[tokio::test]
async fn empty_reply_rollback_policy() {
    let mut session = ChatSession::new(ScriptedTransport::new([ok(&[])]), SYSTEM)
        .with_empty_response_policy(EmptyResponsePolicy::Rollback);
    let status = assert_ok!(session.submit("anyone there?").unwrap().finish().await);
    assert_eq!(status, ReplyStatus::Empty);
    assert_eq!(session.history(), &[Turn::system(SYSTEM)]);
}

#[tokio::test]
async fn dropping_a_reply_rolls_back() {
    let mut session = ChatSession::new(
        ScriptedTransport::new([Script::Hang(vec!["thinking".to_string()])]),
        SYSTEM,
    );
    {
        let mut reply = session.submit("long question").unwrap();
        assert_eq!(reply.next().await.unwrap().unwrap(), "thinking");
        assert_eq!(reply.status(), ReplyStatus::Pending);
    }
    assert_eq!(session.history(), &[Turn::system(SYSTEM)]);
    assert_eq!(session.stats().abandoned, 1);
}

#[tokio::test]
async fn blank_input_is_rejected() {
    let mut session = ChatSession::new(ScriptedTransport::default(), SYSTEM);
    let err = session.submit("  \n").err().unwrap();
    assert!(err.is_validation());
    assert_eq!(session.turn_count(), 1);
    assert!(session.transport().requests().is_empty());
}

#[tokio::test]
async fn send_streaming_renders_completed_reply() {
    let mut session = ChatSession::new(ScriptedTransport::new([ok(&["[Assist", "ant]: 4"])]), SYSTEM)
        .with_assistant_label("Calc");
    let mut renderer = RecordingRenderer::default();
    let status = assert_ok!(session.send_streaming("2+2?", &mut renderer).await);
    assert_eq!(status, ReplyStatus::Completed);
    assert_eq!(
        renderer.events,
        vec![
            "start:Calc",
            "fragment:[Assist",
            "fragment:ant]: 4",
            "finish:Calc:[Assistant]: 4",
        ]
    );
    assert_eq!(session.turn_count(), 3);
}

#[tokio::test]
async fn send_streaming_reports_empty_and_failed_replies() {
    let mut session = ChatSession::new(
        ScriptedTransport::new([
            ok(&[]),
            fail_after(&["half"], Error::authentication("revoked")),
        ]),
        SYSTEM,
    );

    let mut renderer = RecordingRenderer::default();
    let status = assert_ok!(session.send_streaming("hi", &mut renderer).await);
    assert_eq!(status, ReplyStatus::Empty);
    assert_eq!(renderer.events, vec!["start:Assistant", "no-response"]);

    let mut renderer = RecordingRenderer::default();
    let err = assert_err!(session.send_streaming("hi again", &mut renderer).await);
    assert!(err.is_authentication());
    assert_eq!(
        renderer.events,
        vec!["start:Assistant", "fragment:half", "cancel"]
    );
    assert_eq!(
        session.history(),
        &[Turn::system(SYSTEM), Turn::user("hi")]
    );
}

#[tokio::test]
async fn send_streaming_honors_interrupt() {
    let mut session = ChatSession::new(
        ScriptedTransport::new([Script::Hang(vec!["one".to_string(), "two".to_string()])]),
        SYSTEM,
    );
    let mut renderer = RecordingRenderer {
        interrupt_after: Some(1),
        ..RecordingRenderer::default()
    };
    let status = assert_ok!(session.send_streaming("tell me a story", &mut renderer).await);
    assert_eq!(status, ReplyStatus::Abandoned);
    assert_eq!(renderer.events.first().map(String::as_str), Some("start:Assistant"));
    assert_eq!(renderer.events.last().map(String::as_str), Some("interrupted"));
    assert_eq!(session.history(), &[Turn::system(SYSTEM)]);
    assert_eq!(session.stats().abandoned, 1);
}

#[tokio::test]
async fn interrupt_while_waiting_for_first_fragment() {
    let mut session = ChatSession::new(ScriptedTransport::new([Script::Hang(vec![])]), SYSTEM);
    let mut renderer = RecordingRenderer {
        interrupt_after: Some(0),
        ..RecordingRenderer::default()
    };
    let status = assert_ok!(session.send_streaming("hello?", &mut renderer).await);
    assert_eq!(status, ReplyStatus::Abandoned);
    assert_eq!(session.turn_count(), 1);
}
