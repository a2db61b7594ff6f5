// Step processor tests
// Author: Gabriel Demetrios Lafis

use serde_json::json;

use rust_etl_pipeline_engine::{
    data::{record_from_json, Record, Value},
    processing::{ProcessingError, StepConfig, StepOutput, StepType},
};

fn record(json: serde_json::Value) -> Record {
    record_from_json(json).unwrap()
}

fn records(json: serde_json::Value) -> Vec<Record> {
    json.as_array().unwrap().iter().cloned().map(record).collect()
}

fn run(step_type: StepType, config: serde_json::Value, inputs: &[&[Record]]) -> StepOutput {
    let config = StepConfig::parse(step_type, &config).unwrap();
    config.processor().process(inputs).unwrap()
}

fn field<'a>(records: &'a [Record], name: &str) -> Vec<&'a Value> {
    records.iter().map(|r| r.get(name).unwrap_or(&Value::Null)).collect()
}

fn users() -> Vec<Record> {
    records(json!([
        {"id": 1, "name": "Alice", "age": 30},
        {"id": 2, "name": "Bob", "age": 17},
        {"id": 3, "name": "Carol", "age": 45}
    ]))
}

fn orders() -> Vec<Record> {
    records(json!([
        {"orderId": 10, "userId": 1, "total": 50},
        {"orderId": 11, "userId": 1, "total": 25},
        {"orderId": 12, "userId": 4, "total": 99}
    ]))
}

#[test]
fn test_filter() {
    let input = users();
    let config = json!({
        "source": "users",
        "output": "adults",
        "conditions": [{"field": "age", "operator": "gte", "value": 18}]
    });

    let output = run(StepType::Filter, config.clone(), &[&input]);
    assert_eq!(output.input_rows, 3);
    assert_eq!(output.output_rows(), 2);
    assert_eq!(field(&output.records, "name"), vec![&Value::from("Alice"), &Value::from("Carol")]);

    // Filtering twice changes nothing
    let again = run(StepType::Filter, config, &[&output.records]);
    assert_eq!(again.records, output.records);
}

#[test]
fn test_filter_or_logic() {
    let input = users();
    let output = run(
        StepType::Filter,
        json!({
            "source": "users",
            "output": "picked",
            "logic": "or",
            "conditions": [
                {"field": "name", "operator": "eq", "value": "Bob"},
                {"field": "age", "operator": "gt", "value": 40}
            ]
        }),
        &[&input],
    );

    assert_eq!(field(&output.records, "id"), vec![&Value::Integer(2), &Value::Integer(3)]);
}

#[test]
fn test_map() {
    let input = records(json!([{"a": 1, "b": 2, "name": "x"}]));

    let swapped = run(
        StepType::Map,
        json!({
            "source": "in",
            "output": "out",
            "includeOriginal": true,
            "mappings": {
                "a": {"type": "field", "path": "b"},
                "b": {"type": "field", "path": "a"}
            }
        }),
        &[&input],
    );
    assert_eq!(swapped.records, vec![record(json!({"a": 2, "b": 1, "name": "x"}))]);

    let nested = run(
        StepType::Map,
        json!({
            "source": "in",
            "output": "out",
            "mappings": {
                "meta.label": {"type": "template", "template": "{{name}}-{{a}}"},
                "gone": {"type": "field", "path": "missing"}
            }
        }),
        &[&input],
    );
    assert_eq!(nested.records, vec![record(json!({"meta": {"label": "x-1"}}))]);
}

#[test]
fn test_map_undefined_removes_original_field() {
    let input = records(json!([{"a": 1, "b": 2}]));
    let output = run(
        StepType::Map,
        json!({
            "source": "in",
            "output": "out",
            "includeOriginal": true,
            "mappings": {"b": {"type": "field", "path": "nope"}}
        }),
        &[&input],
    );

    assert_eq!(output.records, vec![record(json!({"a": 1}))]);
}

#[test]
fn test_aggregate_groups() {
    let input = records(json!([
        {"region": "north", "amount": 10},
        {"region": "south", "amount": 5.5},
        {"region": "north", "amount": 20},
        {"region": "south", "amount": null},
        {"region": "east"}
    ]));

    let output = run(
        StepType::Aggregate,
        json!({
            "source": "sales",
            "output": "by_region",
            "groupBy": ["region"],
            "aggregations": [
                {"field": "amount", "function": "sum", "as": "total"},
                {"field": "amount", "function": "avg", "as": "average"},
                {"field": "amount", "function": "count", "as": "counted"},
                {"field": "*", "function": "count", "as": "rows"},
                {"field": "amount", "function": "max", "as": "largest"}
            ]
        }),
        &[&input],
    );

    assert_eq!(
        output.records,
        records(json!([
            {"region": "north", "total": 30, "average": 15.0, "counted": 2, "rows": 2, "largest": 20},
            {"region": "south", "total": 5.5, "average": 5.5, "counted": 1, "rows": 2, "largest": 5.5},
            {"region": "east", "total": 0, "average": null, "counted": 0, "rows": 1, "largest": null}
        ]))
    );
    assert_eq!(output.records[0]["total"], Value::Integer(30));
}

#[test]
fn test_aggregate_having() {
    let input = records(json!([
        {"team": "a", "score": 1},
        {"team": "b", "score": 4},
        {"team": "b", "score": 6}
    ]));

    let output = run(
        StepType::Aggregate,
        json!({
            "source": "scores",
            "output": "big_teams",
            "groupBy": ["team"],
            "aggregations": [{"field": "score", "function": "sum", "as": "points"}],
            "having": [{"field": "points", "operator": "gt", "value": 5}]
        }),
        &[&input],
    );

    assert_eq!(output.records, records(json!([{"team": "b", "points": 10}])));
}

#[test]
fn test_aggregate_without_group_by() {
    let config = json!({
        "source": "scores",
        "output": "totals",
        "aggregations": [
            {"field": "*", "function": "count", "as": "n"},
            {"field": "score", "function": "collect", "as": "all"},
            {"field": "score", "function": "countDistinct", "as": "distinct"}
        ]
    });

    let empty: Vec<Record> = Vec::new();
    let output = run(StepType::Aggregate, config.clone(), &[&empty]);
    assert_eq!(output.records, records(json!([{"n": 0, "all": [], "distinct": 0}])));

    let input = records(json!([{"score": 2}, {"score": 2.0}, {"score": 3}]));
    let output = run(StepType::Aggregate, config, &[&input]);
    assert_eq!(output.records, records(json!([{"n": 3, "all": [2, 2.0, 3], "distinct": 2}])));

    let grouped = json!({
        "source": "scores",
        "output": "totals",
        "groupBy": ["team"],
        "aggregations": [{"field": "*", "function": "count", "as": "n"}]
    });
    assert!(run(StepType::Aggregate, grouped, &[&empty]).records.is_empty());
}

fn join(join_type: &str) -> Vec<Record> {
    let (left, right) = (users(), orders());
    let output = run(
        StepType::Join,
        json!({
            "left": "users",
            "right": "orders",
            "output": "joined",
            "type": join_type,
            "on": [{"left": "id", "right": "userId"}],
            "select": {"left": ["id", "name"], "right": ["orderId", "total"]}
        }),
        &[&left, &right],
    );
    assert_eq!(output.input_rows, 6);
    output.records
}

#[test]
fn test_inner_join() {
    assert_eq!(
        join("inner"),
        records(json!([
            {"id": 1, "name": "Alice", "orderId": 10, "total": 50},
            {"id": 1, "name": "Alice", "orderId": 11, "total": 25}
        ]))
    );
}

#[test]
fn test_left_join() {
    assert_eq!(
        join("left"),
        records(json!([
            {"id": 1, "name": "Alice", "orderId": 10, "total": 50},
            {"id": 1, "name": "Alice", "orderId": 11, "total": 25},
            {"id": 2, "name": "Bob"},
            {"id": 3, "name": "Carol"}
        ]))
    );
}

#[test]
fn test_right_join() {
    assert_eq!(
        join("right"),
        records(json!([
            {"id": 1, "name": "Alice", "orderId": 10, "total": 50},
            {"id": 1, "name": "Alice", "orderId": 11, "total": 25},
            {"orderId": 12, "total": 99}
        ]))
    );
}

#[test]
fn test_full_join() {
    let rows = join("full");
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[2], record(json!({"id": 2, "name": "Bob"})));
    assert_eq!(rows[4], record(json!({"orderId": 12, "total": 99})));
}

#[test]
fn test_join_null_keys_never_match() {
    let left = records(json!([{"k": null, "l": 1}, {"l": 2}]));
    let right = records(json!([{"k": null, "r": 1}]));

    let output = run(
        StepType::Join,
        json!({"left": "l", "right": "r", "output": "o", "type": "full", "on": [{"left": "k", "right": "k"}]}),
        &[&left, &right],
    );

    assert_eq!(output.output_rows(), 3);
    assert!(output.records.iter().all(|r| !(r.contains_key("l") && r.contains_key("r"))));
}

#[test]
fn test_join_prefixes() {
    let left = records(json!([{"id": 1, "name": "Alice"}]));
    let right = records(json!([{"id": 7, "userId": 1, "name": "Widget"}]));
    let config = |prefix: serde_json::Value| {
        json!({
            "left": "users",
            "right": "products",
            "output": "o",
            "on": [{"left": "id", "right": "userId"}],
            "prefix": prefix
        })
    };

    let both = run(StepType::Join, config(json!({"left": "u_", "right": "p_"})), &[&left, &right]);
    assert_eq!(
        both.records,
        records(json!([{"u_id": 1, "u_name": "Alice", "p_id": 7, "p_userId": 1, "p_name": "Widget"}]))
    );

    // A single prefix only applies when field names collide
    let one = run(StepType::Join, config(json!({"right": "p_"})), &[&left, &right]);
    assert_eq!(
        one.records,
        records(json!([{"id": 1, "name": "Alice", "p_id": 7, "p_userId": 1, "p_name": "Widget"}]))
    );

    // Without prefixes right fields overwrite left ones
    let none = run(StepType::Join, config(json!({})), &[&left, &right]);
    assert_eq!(none.records, records(json!([{"id": 7, "name": "Widget", "userId": 1}])));
}

#[test]
fn test_join_requires_on() {
    let (left, right) = (users(), orders());
    let config = StepConfig::parse(
        StepType::Join,
        &json!({"left": "users", "right": "orders", "output": "o", "on": []}),
    )
    .unwrap();

    let result = config.processor().process(&[&left, &right]);
    assert!(matches!(result, Err(ProcessingError::InvalidArgument(_))));
}

#[test]
fn test_lookup() {
    let (source, from) = (users(), orders());
    let config = |multiple: bool| {
        json!({
            "source": "users",
            "from": "orders",
            "localField": "id",
            "foreignField": "userId",
            "as": "orders",
            "multiple": multiple,
            "output": "enriched"
        })
    };

    let many = run(StepType::Lookup, config(true), &[&source, &from]);
    assert_eq!(many.input_rows, 3);
    assert_eq!(many.records[0]["orders"].as_array().unwrap().len(), 2);
    assert_eq!(many.records[1]["orders"], Value::Array(Vec::new()));

    let single = run(StepType::Lookup, config(false), &[&source, &from]);
    assert_eq!(single.records[0]["orders"].as_object().unwrap()["orderId"], Value::Integer(10));
    assert_eq!(single.records[2]["orders"], Value::Null);
}

#[test]
fn test_union() {
    let a = records(json!([{"id": 1}, {"id": 2}]));
    let b = records(json!([{"id": 2}, {"id": 3, "extra": true}]));

    let all = run(
        StepType::Union,
        json!({"sources": ["a", "b"], "output": "o"}),
        &[&a, &b],
    );
    assert_eq!(all.input_rows, 4);
    assert_eq!(all.output_rows(), 4);

    let distinct = run(
        StepType::Union,
        json!({"sources": ["a", "b"], "output": "o", "mode": "distinct"}),
        &[&a, &b],
    );
    assert_eq!(distinct.records, records(json!([{"id": 1}, {"id": 2}, {"id": 3, "extra": true}])));

    let keyed = run(
        StepType::Union,
        json!({"sources": ["b", "a"], "output": "o", "mode": "distinct", "distinctKeys": ["id"]}),
        &[&b, &a],
    );
    assert_eq!(field(&keyed.records, "id"), vec![&Value::Integer(2), &Value::Integer(3), &Value::Integer(1)]);
}

#[test]
fn test_deduplicate() {
    let input = records(json!([
        {"email": "a@x", "seen": 3},
        {"email": "b@x", "seen": 1},
        {"email": "a@x", "seen": 1},
        {"email": "a@x", "seen": 2}
    ]));

    let first = run(
        StepType::Deduplicate,
        json!({"source": "s", "output": "o", "keys": ["email"]}),
        &[&input],
    );
    assert_eq!(first.records, records(json!([{"email": "a@x", "seen": 3}, {"email": "b@x", "seen": 1}])));

    let latest_config = json!({
        "source": "s",
        "output": "o",
        "keys": ["email"],
        "keep": "last",
        "orderBy": [{"field": "seen"}]
    });
    let latest = run(StepType::Deduplicate, latest_config.clone(), &[&input]);
    assert_eq!(latest.records, records(json!([{"email": "a@x", "seen": 3}, {"email": "b@x", "seen": 1}])));

    let again = run(StepType::Deduplicate, latest_config, &[&latest.records]);
    assert_eq!(again.records, latest.records);
}

#[test]
fn test_deduplicate_whole_record() {
    let input = records(json!([{"a": 1, "b": 2}, {"b": 2, "a": 1}, {"a": 1}]));
    let output = run(
        StepType::Deduplicate,
        json!({"source": "s", "output": "o", "keys": []}),
        &[&input],
    );

    assert_eq!(output.output_rows(), 2);
}

#[test]
fn test_sort_is_stable() {
    let input = records(json!([
        {"name": "d", "rank": 2},
        {"name": "a", "rank": 1},
        {"name": "c", "rank": 2},
        {"name": "b", "rank": 1}
    ]));

    let output = run(
        StepType::Sort,
        json!({"source": "s", "output": "o", "orderBy": [{"field": "rank", "direction": "desc"}]}),
        &[&input],
    );

    let names: Vec<&Value> = field(&output.records, "name");
    assert_eq!(names, vec![&Value::from("d"), &Value::from("c"), &Value::from("a"), &Value::from("b")]);
}

#[test]
fn test_sort_nulls() {
    let input = records(json!([{"v": null}, {"v": 2}, {}, {"v": 1}]));

    let last = run(
        StepType::Sort,
        json!({"source": "s", "output": "o", "orderBy": [{"field": "v", "direction": "desc"}]}),
        &[&input],
    );
    assert_eq!(last.records[0]["v"], Value::Integer(2));
    assert_eq!(last.records[1]["v"], Value::Integer(1));
    assert!(last.records[2..].iter().all(|r| r.get("v").map_or(true, Value::is_null)));

    let first = run(
        StepType::Sort,
        json!({"source": "s", "output": "o", "orderBy": [{"field": "v", "nulls": "first"}]}),
        &[&input],
    );
    assert_eq!(first.records[2]["v"], Value::Integer(1));
    assert_eq!(first.records[3]["v"], Value::Integer(2));
}

#[test]
fn test_limit() {
    let input = users();

    let page = run(StepType::Limit, json!({"source": "s", "output": "o", "limit": 2, "offset": 1}), &[&input]);
    assert_eq!(field(&page.records, "id"), vec![&Value::Integer(2), &Value::Integer(3)]);

    let beyond = run(StepType::Limit, json!({"source": "s", "output": "o", "limit": 5, "offset": 9}), &[&input]);
    assert!(beyond.records.is_empty());
    assert_eq!(beyond.input_rows, 3);
}

#[test]
fn test_pivot_then_unpivot() {
    let input = records(json!([
        {"product": "pen", "quarter": "Q1", "sales": 10},
        {"product": "pen", "quarter": "Q2", "sales": 15},
        {"product": "ink", "quarter": "Q1", "sales": 7},
        {"product": "ink", "quarter": "Q2", "sales": 3}
    ]));

    let pivoted = run(
        StepType::Pivot,
        json!({
            "source": "sales",
            "output": "wide",
            "groupBy": ["product"],
            "pivotField": "quarter",
            "valueField": "sales",
            "aggregation": "sum"
        }),
        &[&input],
    );
    assert_eq!(
        pivoted.records,
        records(json!([
            {"product": "pen", "Q1": 10, "Q2": 15},
            {"product": "ink", "Q1": 7, "Q2": 3}
        ]))
    );

    let unpivoted = run(
        StepType::Unpivot,
        json!({
            "source": "wide",
            "output": "long",
            "idFields": ["product"],
            "unpivotFields": ["Q1", "Q2"],
            "nameField": "quarter",
            "valueField": "sales"
        }),
        &[&pivoted.records],
    );
    assert_eq!(unpivoted.records, input);
}

#[test]
fn test_pivot_count_fills_missing_columns() {
    let input = records(json!([
        {"user": "a", "event": "click"},
        {"user": "a", "event": "view"},
        {"user": "b", "event": "view"},
        {"user": "b"}
    ]));

    let output = run(
        StepType::Pivot,
        json!({
            "source": "events",
            "output": "counts",
            "groupBy": ["user"],
            "pivotField": "event",
            "valueField": "event",
            "aggregation": "count"
        }),
        &[&input],
    );

    assert_eq!(
        output.records,
        records(json!([
            {"user": "a", "click": 1, "view": 1},
            {"user": "b", "click": 0, "view": 1}
        ]))
    );
}

#[test]
fn test_unpivot_skips_absent_fields() {
    let input = records(json!([{"id": 1, "x": 5}]));
    let output = run(
        StepType::Unpivot,
        json!({"source": "s", "output": "o", "idFields": ["id"], "unpivotFields": ["x", "y"]}),
        &[&input],
    );

    assert_eq!(output.records, records(json!([{"id": 1, "field": "x", "value": 5}])));
}

#[test]
fn test_flatten() {
    let input = records(json!([
        {"id": 1, "tags": ["a", "b"]},
        {"id": 2, "tags": []},
        {"id": 3, "tags": "solo"}
    ]));

    let output = run(
        StepType::Flatten,
        json!({"source": "s", "output": "o", "field": "tags"}),
        &[&input],
    );
    assert_eq!(output.records, records(json!([{"id": 1, "tags": "a"}, {"id": 1, "tags": "b"}])));

    let preserved = run(
        StepType::Flatten,
        json!({"source": "s", "output": "o", "field": "tags", "as": "tag", "preserveEmpty": true}),
        &[&input],
    );
    assert_eq!(preserved.output_rows(), 4);
    assert_eq!(preserved.records[0], record(json!({"id": 1, "tags": ["a", "b"], "tag": "a"})));
    assert_eq!(preserved.records[2], record(json!({"id": 2, "tags": []})));
}

#[test]
fn test_invalid_config() {
    let missing = StepConfig::parse(StepType::Filter, &json!({"source": "s", "output": "o"}));
    assert!(matches!(missing, Err(ProcessingError::InvalidConfig(_))));

    let bad_operator = StepConfig::parse(
        StepType::Filter,
        &json!({"source": "s", "output": "o", "conditions": [{"field": "a", "operator": "like"}]}),
    );
    assert!(matches!(bad_operator, Err(ProcessingError::InvalidConfig(_))));

    let config = StepConfig::parse(StepType::Limit, &json!({"source": "s", "output": "o", "limit": 1})).unwrap();
    assert_eq!(config.step_type(), StepType::Limit);
    assert_eq!(config.sources(), vec!["s"]);
    assert_eq!(config.output(), "o");
}
