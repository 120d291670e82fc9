//! Integration tests for call setup, teardown, and chat.
//!
//! Each test drives real clients over TCP and asserts on the exact
//! reply sequences the protocol documents.

mod common;

use common::TestServer;
use pbx_proto::{Reply, TuState};

#[tokio::test]
async fn full_call_round_trip() {
    let server = TestServer::spawn(17001).await.expect("spawn server");
    let mut caller = server.connect().await.expect("connect caller");
    let mut callee = server.connect().await.expect("connect callee");
    let caller_ext = caller.extension();
    let callee_ext = callee.extension();

    caller.pickup().await.expect("pickup");
    assert_eq!(
        caller.recv().await.expect("recv"),
        Reply::state(TuState::DialTone)
    );

    caller.dial(callee_ext).await.expect("dial");
    assert_eq!(
        caller.recv().await.expect("recv"),
        Reply::state(TuState::RingBack)
    );
    assert_eq!(
        callee.recv().await.expect("recv"),
        Reply::state(TuState::Ringing)
    );

    callee.pickup().await.expect("answer");
    assert_eq!(
        callee.recv().await.expect("recv"),
        Reply::state_with(TuState::Connected, caller_ext)
    );
    assert_eq!(
        caller.recv().await.expect("recv"),
        Reply::state_with(TuState::Connected, callee_ext)
    );

    callee.hangup().await.expect("hangup");
    assert_eq!(
        callee.recv().await.expect("recv"),
        Reply::state_with(TuState::OnHook, callee_ext)
    );
    assert_eq!(
        caller.recv().await.expect("recv"),
        Reply::state(TuState::DialTone)
    );

    caller.hangup().await.expect("hangup");
    assert_eq!(
        caller.recv().await.expect("recv"),
        Reply::state_with(TuState::OnHook, caller_ext)
    );
}

#[tokio::test]
async fn chat_is_relayed_verbatim_with_a_connected_echo() {
    let server = TestServer::spawn(17002).await.expect("spawn server");
    let mut caller = server.connect().await.expect("connect caller");
    let mut callee = server.connect().await.expect("connect callee");
    let callee_ext = callee.extension();

    caller.pickup().await.expect("pickup");
    caller.recv().await.expect("dial tone");
    caller.dial(callee_ext).await.expect("dial");
    caller.recv().await.expect("ring back");
    callee.recv().await.expect("ringing");
    callee.pickup().await.expect("answer");
    callee.recv().await.expect("connected");
    caller.recv().await.expect("connected");

    caller.chat("hi").await.expect("chat");
    assert_eq!(
        callee.recv().await.expect("recv"),
        Reply::Chat("hi".to_string())
    );
    assert_eq!(
        caller.recv().await.expect("recv"),
        Reply::state_with(TuState::Connected, callee_ext)
    );

    callee.chat("two  spaces  kept").await.expect("chat back");
    assert_eq!(
        caller.recv().await.expect("recv"),
        Reply::Chat("two  spaces  kept".to_string())
    );
}

#[tokio::test]
async fn dialing_a_nonexistent_extension_errors_until_hangup() {
    let server = TestServer::spawn(17003).await.expect("spawn server");
    let mut client = server.connect().await.expect("connect");
    let ext = client.extension();

    client.pickup().await.expect("pickup");
    assert_eq!(
        client.recv().await.expect("recv"),
        Reply::state(TuState::DialTone)
    );

    client.dial(999_999).await.expect("dial");
    assert_eq!(
        client.recv().await.expect("recv"),
        Reply::state(TuState::Error)
    );

    // Still in error until the handset goes back on the hook.
    client.send_raw("pickup").await.expect("pickup again");
    assert_eq!(
        client.recv().await.expect("recv"),
        Reply::state(TuState::Error)
    );

    client.hangup().await.expect("hangup");
    assert_eq!(
        client.recv().await.expect("recv"),
        Reply::state_with(TuState::OnHook, ext)
    );
}

#[tokio::test]
async fn dialing_your_own_extension_sounds_busy() {
    let server = TestServer::spawn(17004).await.expect("spawn server");
    let mut client = server.connect().await.expect("connect");
    let ext = client.extension();

    client.pickup().await.expect("pickup");
    client.recv().await.expect("dial tone");
    client.dial(ext).await.expect("dial self");
    assert_eq!(
        client.recv().await.expect("recv"),
        Reply::state(TuState::BusySignal)
    );
}

#[tokio::test]
async fn dialing_an_occupied_extension_sounds_busy() {
    let server = TestServer::spawn(17005).await.expect("spawn server");
    let mut caller = server.connect().await.expect("connect caller");
    let mut other = server.connect().await.expect("connect other");

    other.pickup().await.expect("other pickup");
    other.recv().await.expect("other dial tone");

    caller.pickup().await.expect("pickup");
    caller.recv().await.expect("dial tone");
    caller.dial(other.extension()).await.expect("dial");
    assert_eq!(
        caller.recv().await.expect("recv"),
        Reply::state(TuState::BusySignal)
    );
}

#[tokio::test]
async fn caller_hanging_up_stops_the_ringing_phone() {
    let server = TestServer::spawn(17006).await.expect("spawn server");
    let mut caller = server.connect().await.expect("connect caller");
    let mut callee = server.connect().await.expect("connect callee");
    let caller_ext = caller.extension();
    let callee_ext = callee.extension();

    caller.pickup().await.expect("pickup");
    caller.recv().await.expect("dial tone");
    caller.dial(callee_ext).await.expect("dial");
    caller.recv().await.expect("ring back");
    callee.recv().await.expect("ringing");

    caller.hangup().await.expect("hangup");
    assert_eq!(
        caller.recv().await.expect("recv"),
        Reply::state_with(TuState::OnHook, caller_ext)
    );
    assert_eq!(
        callee.recv().await.expect("recv"),
        Reply::state_with(TuState::OnHook, callee_ext)
    );
}

#[tokio::test]
async fn every_command_gets_exactly_one_reply_even_as_a_no_op() {
    let server = TestServer::spawn(17007).await.expect("spawn server");
    let mut client = server.connect().await.expect("connect");
    let ext = client.extension();

    // hangup while already on hook
    client.hangup().await.expect("hangup");
    assert_eq!(
        client.recv().await.expect("recv"),
        Reply::state_with(TuState::OnHook, ext)
    );

    // dial without picking up
    client.dial(42).await.expect("dial");
    assert_eq!(
        client.recv().await.expect("recv"),
        Reply::state_with(TuState::OnHook, ext)
    );

    // chat without a call
    client.chat("anyone?").await.expect("chat");
    assert_eq!(
        client.recv().await.expect("recv"),
        Reply::state_with(TuState::OnHook, ext)
    );

    // pickup twice re-reports the dial tone
    client.pickup().await.expect("pickup");
    client.pickup().await.expect("pickup again");
    assert_eq!(
        client.recv().await.expect("recv"),
        Reply::state(TuState::DialTone)
    );
    assert_eq!(
        client.recv().await.expect("recv"),
        Reply::state(TuState::DialTone)
    );
}

#[tokio::test]
async fn malformed_lines_are_ignored_without_a_reply() {
    let server = TestServer::spawn(17008).await.expect("spawn server");
    let mut client = server.connect().await.expect("connect");

    // None of these elicit a reply line.
    client.send_raw("").await.expect("send");
    client.send_raw("PICKUP").await.expect("send");
    client.send_raw("dial").await.expect("send");
    client.send_raw("dial42").await.expect("send");
    client.send_raw("ring ring").await.expect("send");

    // The next valid command's reply is the first line we see.
    client.pickup().await.expect("pickup");
    assert_eq!(
        client.recv().await.expect("recv"),
        Reply::state(TuState::DialTone)
    );
}

#[tokio::test]
async fn present_but_unparsable_dial_target_is_an_error() {
    let server = TestServer::spawn(17009).await.expect("spawn server");
    let mut client = server.connect().await.expect("connect");

    client.pickup().await.expect("pickup");
    client.recv().await.expect("dial tone");
    client.send_raw("dial twelve").await.expect("send");
    assert_eq!(
        client.recv().await.expect("recv"),
        Reply::state(TuState::Error)
    );
}
