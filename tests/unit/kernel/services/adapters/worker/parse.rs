use super::*;
use crate::kernel::highlight::{HighlightOp, IgnoreList, Language};

fn table() -> GroupTable {
    GroupTable::new(
        Language::Go,
        "fsp",
        [
            (KindTag::FUNCTION, "TagHlFunction"),
            (KindTag::STRUCT, "TagHlStruct"),
            (KindTag::PACKAGE, "TagHlPackage"),
            (KindTag::MEMBER, "TagHlMember"),
        ],
        IgnoreList::new(["nil", "main"]),
    )
}

#[test]
fn record_decodes_all_fields() {
    let record = WorkerRecord::parse("s\t4\t5\t4\t12\t7\tHandler").unwrap();
    assert_eq!(record.kind, KindTag::STRUCT);
    assert_eq!(
        (record.start_line, record.start_col, record.end_line, record.end_col),
        (4, 5, 4, 12)
    );
    assert_eq!(record.ident, "Handler");
    assert_eq!(record.span(), LineSpan::new(4, 5, 12));
}

#[test]
fn record_with_missing_or_bad_fields_is_rejected() {
    for line in [
        "m\t5\t10\t5\t14\tfoo",
        "s\t4\t5\t4\t12\t7",
        "ss\t4\t5\t4\t12\t7\tHandler",
        "\t4\t5\t4\t12\t7\tHandler",
        "s\tx\t5\t4\t12\t7\tHandler",
        "s\t4\t5\t4\t-1\t7\tHandler",
        "s\t4\t5\t4\t12\t7\t",
        "s 4 5 4 12 7 Handler",
    ] {
        assert!(WorkerRecord::parse(line).is_none(), "{:?}", line);
    }
}

#[test]
fn ident_is_cut_to_declared_length_and_first_word() {
    let record = WorkerRecord::parse("f\t1\t0\t1\t3\t3\tRunner").unwrap();
    assert_eq!(record.ident, "Run");

    let record = WorkerRecord::parse("f\t1\t0\t1\t3\t10\tRun extra").unwrap();
    assert_eq!(record.ident, "Run");
}

#[test]
fn ident_is_bounded() {
    let long = "a".repeat(MAX_IDENT_LEN + 50);
    let line = format!("f\t0\t0\t0\t1\t{}\t{}", long.len(), long);
    let record = WorkerRecord::parse(&line).unwrap();
    assert_eq!(record.ident.len(), MAX_IDENT_LEN);
}

#[test]
fn records_are_split_and_sorted() {
    let records = split_and_sort("b\n\na\r\nc");
    assert_eq!(records, ["a", "b", "c"]);
    assert!(split_and_sort("").is_empty());
    assert!(split_and_sort("\n\n").is_empty());
}

#[test]
fn output_becomes_adds_for_active_kinds() {
    let payload = "s\t4\t5\t4\t12\t7\tHandler\n\
                   f\t9\t1\t9\t4\t3\tRun\n\
                   m\t5\t10\t5\t14\t4\tname\n\
                   garbage line\n\
                   p\t0\t8\t0\t12\t4\tmain\n";

    let mut batch = CallBatch::new();
    let added = parse_worker_output(payload, &table(), BufferId(2), 6, &mut batch);

    assert_eq!(added, 2);
    assert_eq!(
        batch.ops(),
        &[
            HighlightOp::add(BufferId(2), 6, "TagHlFunction", LineSpan::new(9, 1, 4)),
            HighlightOp::add(BufferId(2), 6, "TagHlStruct", LineSpan::new(4, 5, 12)),
        ]
    );
}

#[test]
fn inactive_member_record_yields_nothing() {
    let mut batch = CallBatch::new();
    let added = parse_worker_output("m\t5\t10\t5\t14\t3\tfoo\n", &table(), BufferId(1), 1, &mut batch);
    assert_eq!(added, 0);
    assert!(batch.is_empty());
}

#[test]
fn only_the_start_line_is_used() {
    let mut batch = CallBatch::new();
    parse_worker_output("f\t3\t2\t8\t6\t4\tmake\n", &table(), BufferId(1), 1, &mut batch);
    assert!(matches!(
        batch.ops(),
        [HighlightOp::Add {
            line: 3,
            start_col: 2,
            end_col: 6,
            ..
        }]
    ));
}
