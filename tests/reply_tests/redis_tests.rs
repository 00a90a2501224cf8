//! Tests for the RESP2/RESP3 builder
//!
//! These tests verify:
//! - Scalar encodings under both protocol versions
//! - Collection headers and string arrays
//! - Scored arrays in every mode
//! - Multi-get replies, including arena-backed values
//! - Error lines and their statistics

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use common::{decode, decode_all, RecordingSink, Resp};
use replywire::reply::{
    CollectionType, ErrorKind, GetResp, MGetResponse, SinkReplyBuilder, VerbatimFormat, SYNTAX_ERR,
};
use replywire::stats::ReplyCounters;
use replywire::{Config, RedisReplyBuilder, ReplyBuilder};

fn resp2() -> RedisReplyBuilder<RecordingSink> {
    RedisReplyBuilder::new(RecordingSink::new())
}

fn resp3() -> RedisReplyBuilder<RecordingSink> {
    let mut rb = RedisReplyBuilder::new(RecordingSink::new());
    rb.set_resp3(true);
    rb
}

fn with_counters(counters: &Arc<ReplyCounters>) -> RedisReplyBuilder<RecordingSink> {
    RedisReplyBuilder::from_base(
        SinkReplyBuilder::new(RecordingSink::new()).with_stats(Arc::clone(counters)),
    )
}

fn output(rb: RedisReplyBuilder<RecordingSink>) -> Vec<u8> {
    rb.into_sink().data
}

// =============================================================================
// Scalar Tests
// =============================================================================

#[test]
fn test_simple_string_and_long() {
    let mut rb = resp2();
    rb.send_ok();
    rb.send_simple_string("PONG");
    rb.send_long(-12);
    rb.send_long(i64::MAX);

    assert_eq!(
        output(rb),
        b"+OK\r\n+PONG\r\n:-12\r\n:9223372036854775807\r\n"
    );
}

#[test]
fn test_bulk_string_binary_safe() {
    let mut rb = resp2();
    rb.send_bulk_string(b"a\r\nb\0");
    rb.send_bulk_string(b"");

    assert_eq!(output(rb), b"$5\r\na\r\nb\0\r\n$0\r\n\r\n");
}

#[test]
fn test_nulls_per_version() {
    let mut rb = resp2();
    rb.send_null();
    rb.send_null_array();
    assert_eq!(output(rb), b"$-1\r\n*-1\r\n");

    let mut rb = resp3();
    rb.send_null();
    rb.send_null_array();
    assert_eq!(output(rb), b"_\r\n_\r\n");
}

#[test]
fn test_config_selects_initial_version() {
    let config = Arc::new(Config::builder().resp3(true).build().unwrap());
    let mut rb = RedisReplyBuilder::with_config(RecordingSink::new(), config);
    assert!(rb.is_resp3());

    rb.send_null();
    rb.set_resp3(false);
    rb.send_null();
    assert_eq!(output(rb), b"_\r\n$-1\r\n");
}

#[test]
fn test_double_resp3() {
    let mut rb = resp3();
    rb.send_double(1.5);
    rb.send_double(1.0);
    rb.send_double(f64::INFINITY);
    rb.send_double(f64::NEG_INFINITY);
    rb.send_double(f64::NAN);
    rb.send_double(1e21);

    assert_eq!(
        String::from_utf8(output(rb)).unwrap(),
        ",1.5\r\n,1\r\n,inf\r\n,-inf\r\n,nan\r\n,1e+21\r\n"
    );
}

#[test]
fn test_double_resp2_is_bulk_string() {
    let mut rb = resp2();
    rb.send_double(3.25);
    rb.send_double(1.0);
    rb.send_double(-0.0);

    assert_eq!(output(rb), b"$4\r\n3.25\r\n$1\r\n1\r\n$2\r\n-0\r\n");
}

#[test]
fn test_double_round_trips_through_decoder() {
    for value in [0.1, -7.125, 1.0 / 3.0, 6.02e23, 5e-324] {
        let mut rb = resp3();
        rb.send_double(value);
        assert_eq!(decode(&output(rb)), Resp::Double(value));
    }
}

#[test]
fn test_negative_zero_keeps_sign() {
    let mut rb = resp3();
    rb.send_double(-0.0);
    rb.send_double(0.0);
    let out = output(rb);
    assert_eq!(out, b",-0\r\n,0\r\n");

    match &decode_all(&out)[..] {
        [Resp::Double(neg), Resp::Double(pos)] => {
            assert!(neg.is_sign_negative());
            assert!(pos.is_sign_positive());
        }
        other => panic!("unexpected replies: {:?}", other),
    }
}

#[test]
fn test_verbatim_string() {
    let mut rb = resp3();
    rb.send_verbatim_string(b"hello", VerbatimFormat::Txt);
    rb.send_verbatim_string(b"# hi", VerbatimFormat::Markdown);
    assert_eq!(
        output(rb),
        b"=9\r\ntxt:hello\r\n=8\r\nmkd:# hi\r\n"
    );

    let mut rb = resp2();
    rb.send_verbatim_string(b"hello", VerbatimFormat::Txt);
    assert_eq!(output(rb), b"$5\r\nhello\r\n");
}

#[test]
fn test_stored_and_skipped() {
    let mut rb = resp2();
    rb.send_stored();
    rb.send_set_skipped();
    assert_eq!(output(rb), b"+OK\r\n$-1\r\n");

    let mut rb = resp3();
    rb.send_set_skipped();
    assert_eq!(output(rb), b"_\r\n");
}

// =============================================================================
// Collection Tests
// =============================================================================

#[test]
fn test_empty_array_header() {
    let mut rb = resp2();
    rb.send_empty_array();
    assert_eq!(rb.base().sink().writes, 1);
    assert_eq!(output(rb), b"*0\r\n");
}

#[test]
fn test_collection_kinds_resp3() {
    let mut rb = resp3();
    rb.start_collection(1, CollectionType::Map);
    rb.send_bulk_string(b"k");
    rb.send_long(1);
    rb.start_collection(1, CollectionType::Set);
    rb.send_long(2);
    rb.start_collection(2, CollectionType::Push);
    rb.send_bulk_string(b"message");
    rb.send_bulk_string(b"hi");

    assert_eq!(
        decode_all(&output(rb)),
        vec![
            Resp::Map(vec![(Resp::bulk("k"), Resp::Int(1))]),
            Resp::Set(vec![Resp::Int(2)]),
            Resp::Push(vec![Resp::bulk("message"), Resp::bulk("hi")]),
        ]
    );
}

#[test]
fn test_collection_kinds_resp2_degrade_to_arrays() {
    let mut rb = resp2();
    rb.start_collection(1, CollectionType::Map);
    rb.send_bulk_string(b"k");
    rb.send_long(1);
    rb.start_collection(1, CollectionType::Set);
    rb.send_long(2);

    assert_eq!(output(rb), b"*2\r\n$1\r\nk\r\n:1\r\n*1\r\n:2\r\n");
}

#[test]
fn test_string_arr_kinds() {
    let items = ["k1", "v1", "k2", "v2"];

    let mut rb = resp3();
    rb.send_string_arr(&items, CollectionType::Map);
    rb.send_string_arr(&items[..2], CollectionType::Set);
    assert_eq!(
        decode_all(&output(rb)),
        vec![
            Resp::Map(vec![
                (Resp::bulk("k1"), Resp::bulk("v1")),
                (Resp::bulk("k2"), Resp::bulk("v2")),
            ]),
            Resp::Set(vec![Resp::bulk("k1"), Resp::bulk("v1")]),
        ]
    );

    let mut rb = resp2();
    rb.send_string_arr(&items, CollectionType::Map);
    assert_eq!(
        decode(&output(rb)),
        Resp::Array(items.iter().map(|s| Resp::bulk(s)).collect())
    );
}

#[test]
fn test_short_string_arr_is_one_write() {
    let items: Vec<String> = (0..300).map(|i| format!("{}", i % 10)).collect();
    let mut rb = resp2();
    rb.send_string_arr(&items, CollectionType::Array);

    assert_eq!(rb.base().sink().writes, 1);
    let expected = Resp::Array(items.iter().map(|s| Resp::bulk(s)).collect());
    assert_eq!(decode(&output(rb)), expected);
}

#[test]
fn test_long_string_arr_is_chunked() {
    let items: Vec<String> = (0..300).map(|i| format!("member-{:05}", i)).collect();
    let mut rb = resp2();
    rb.send_string_arr(&items, CollectionType::Array);

    assert!(rb.base().sink().writes >= 3);
    let expected = Resp::Array(items.iter().map(|s| Resp::bulk(s)).collect());
    assert_eq!(decode(&output(rb)), expected);
}

#[test]
fn test_simple_str_arr() {
    let mut rb = resp2();
    rb.send_simple_str_arr(&["a", "bc"]);
    rb.send_simple_str_arr(&Vec::<&str>::new());
    assert_eq!(output(rb), b"*2\r\n+a\r\n+bc\r\n*0\r\n");
}

// =============================================================================
// Scored Array Tests
// =============================================================================

fn scored() -> Vec<(&'static str, f64)> {
    vec![("a", 1.5), ("b", 2.0)]
}

#[test]
fn test_scored_without_scores() {
    for rb in [resp2(), resp3()] {
        let mut rb = rb;
        rb.send_scored_array(&scored(), false);
        assert_eq!(rb.base().sink().writes, 1);
        assert_eq!(output(rb), b"*2\r\n$1\r\na\r\n$1\r\nb\r\n");
    }
}

#[test]
fn test_scored_without_scores_sends_members_only() {
    let members = [("alpha", 1.5), ("beta", -0.0), ("gamma", f64::INFINITY)];
    let mut rb = resp3();
    rb.send_scored_array(&members, false);
    rb.send_scored_array(&Vec::<(&str, f64)>::new(), false);

    assert_eq!(
        decode_all(&output(rb)),
        vec![
            Resp::Array(vec![Resp::bulk("alpha"), Resp::bulk("beta"), Resp::bulk("gamma")]),
            Resp::Array(vec![]),
        ]
    );
}

#[test]
fn test_scored_resp2_flat() {
    let mut rb = resp2();
    rb.send_scored_array(&scored(), true);
    assert_eq!(rb.base().sink().writes, 1);
    assert_eq!(
        output(rb),
        b"*4\r\n$1\r\na\r\n$3\r\n1.5\r\n$1\r\nb\r\n$1\r\n2\r\n"
    );
}

#[test]
fn test_scored_resp3_nested() {
    let mut rb = resp3();
    rb.send_scored_array(&scored(), true);
    assert_eq!(rb.base().sink().writes, 1);
    assert_eq!(
        decode(&output(rb)),
        Resp::Array(vec![
            Resp::Array(vec![Resp::bulk("a"), Resp::Double(1.5)]),
            Resp::Array(vec![Resp::bulk("b"), Resp::Double(2.0)]),
        ])
    );
}

#[test]
fn test_scored_empty() {
    let mut rb = resp3();
    rb.send_scored_array::<&str>(&[], true);
    assert_eq!(output(rb), b"*0\r\n");
}

// =============================================================================
// Multi-get Tests
// =============================================================================

#[test]
fn test_mget_hits_and_misses() {
    let mut resp = MGetResponse::with_len(3);
    resp.set(0, GetResp::new("a", "1"));
    resp.set(2, GetResp::new("c", "333"));

    let mut rb = resp2();
    rb.send_mget_response(resp);
    assert_eq!(output(rb), b"*3\r\n$1\r\n1\r\n$-1\r\n$3\r\n333\r\n");
}

#[test]
fn test_mget_resp3_miss_is_null() {
    let mut resp = MGetResponse::new();
    resp.push(None);
    resp.push(Some(GetResp::new("k", "v")));

    let mut rb = resp3();
    rb.send_mget_response(resp);
    assert_eq!(
        decode(&output(rb)),
        Resp::Array(vec![Resp::Null, Resp::bulk("v")])
    );
}

#[test]
fn test_mget_empty_value_is_hit() {
    let mut resp = MGetResponse::new();
    resp.push(Some(GetResp::new("k", "")));

    let mut rb = resp2();
    rb.send_mget_response(resp);
    assert_eq!(output(rb), b"*1\r\n$0\r\n\r\n");
}

#[test]
fn test_mget_arena_values() {
    let mut resp = MGetResponse::with_len(2);
    let copied = resp.copy_value(b"from-arena");
    resp.set(0, GetResp::new("a", copied));

    let id = resp.alloc_storage(3);
    resp.storage_mut(id).unwrap()[..3].copy_from_slice(b"xyz");
    let stored = resp.stored_value(id, 3).unwrap();
    resp.set(1, GetResp::new("b", stored));

    let mut rb = resp2();
    rb.send_mget_response(resp);
    assert_eq!(
        decode(&output(rb)),
        Resp::Array(vec![Resp::bulk("from-arena"), Resp::bulk("xyz")])
    );
}

#[test]
fn test_mget_value_from_another_response_is_null() {
    let mut other = MGetResponse::new();
    let foreign = other.copy_value(b"hello");

    let mut resp = MGetResponse::new();
    resp.copy_value(b"own block");
    resp.push(Some(GetResp::new("k", foreign)));
    resp.push(Some(GetResp::new("j", "ok")));

    let mut rb = resp2();
    rb.send_mget_response(resp);
    assert_eq!(
        decode(&output(rb)),
        Resp::Array(vec![Resp::NullBulk, Resp::bulk("ok")])
    );
}

#[test]
fn test_large_mget_decodes_back() {
    let values: Vec<Vec<u8>> = (0..200).map(|i| vec![b'a' + (i % 26) as u8; i]).collect();
    let mut resp = MGetResponse::with_len(values.len());
    for (i, value) in values.iter().enumerate() {
        if i % 3 != 0 {
            resp.set(i, GetResp::new(format!("key:{}", i), &value[..]));
        }
    }

    let mut rb = resp2();
    rb.send_mget_response(resp);
    assert!(rb.base().sink().writes > 1);

    let expected: Vec<Resp> = values
        .iter()
        .enumerate()
        .map(|(i, v)| if i % 3 == 0 { Resp::NullBulk } else { Resp::Bulk(v.clone()) })
        .collect();
    assert_eq!(decode(&output(rb)), Resp::Array(expected));
}

#[test]
fn test_mget_inside_aggregation_is_one_write() {
    let values: Vec<String> = (0..100).map(|i| format!("value-{}", i)).collect();
    let mut resp = MGetResponse::with_len(values.len());
    for (i, value) in values.iter().enumerate() {
        resp.set(i, GetResp::new(format!("k{}", i), value.as_str()));
    }

    let mut rb = resp2();
    {
        let mut agg = rb.aggregate();
        agg.send_mget_response(resp);
    }
    assert_eq!(rb.base().sink().writes, 1);
}

// =============================================================================
// Error Tests
// =============================================================================

#[test]
fn test_error_prefixing() {
    let mut rb = resp2();
    rb.send_error("unknown command", &ErrorKind::Generic);
    rb.send_error("-NOAUTH Authentication required.", &ErrorKind::Generic);
    rb.send_error(SYNTAX_ERR, &ErrorKind::Syntax);

    assert_eq!(
        String::from_utf8(output(rb)).unwrap(),
        "-ERR unknown command\r\n-NOAUTH Authentication required.\r\n-ERR syntax error\r\n"
    );
}

#[test]
fn test_protocol_error() {
    let counters = Arc::new(ReplyCounters::new());
    let mut rb = with_counters(&counters);
    rb.send_protocol_error("invalid multibulk length");

    assert_eq!(
        output(rb),
        b"-ERR Protocol error: invalid multibulk length\r\n".to_vec()
    );
    assert_eq!(
        counters.snapshot().err_count.get("protocol_error"),
        Some(&1)
    );
}

#[test]
fn test_error_statistics_by_kind() {
    let counters = Arc::new(ReplyCounters::new());
    let mut rb = with_counters(&counters);
    rb.send_error("bad", &ErrorKind::WrongType);
    rb.send_error("bad again", &ErrorKind::WrongType);
    rb.send_error(SYNTAX_ERR, &ErrorKind::Generic);
    rb.send_error("unknown command", &ErrorKind::Generic);
    rb.send_error("custom", &ErrorKind::Custom("my_kind".into()));

    let stats = counters.snapshot();
    assert_eq!(stats.err_count.get("wrong_type"), Some(&2));
    assert_eq!(stats.err_count.get("syntax_error"), Some(&1));
    assert_eq!(stats.err_count.get("unknown command"), Some(&1));
    assert_eq!(stats.err_count.get("my_kind"), Some(&1));
    assert_eq!(stats.io_write_cnt, 5);
}

#[test]
fn test_write_statistics() {
    let counters = Arc::new(ReplyCounters::new());
    let mut rb = with_counters(&counters);
    rb.send_long(1);
    rb.set_batch_mode(true);
    rb.send_ok();
    rb.send_ok();
    rb.set_batch_mode(false);

    let stats = counters.snapshot();
    assert_eq!(stats.io_write_cnt, 2);
    assert_eq!(stats.io_write_bytes, (4 + 5 + 5) as u64);
    assert_eq!(stats.send_stats.count, 2);
}
