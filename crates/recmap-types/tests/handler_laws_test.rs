//! Integration test: conversion laws shared by every built-in handler
//!
//! Round trip: `parse(format(v)) == v` for values in each handler's domain.
//! Strictness: a valid prefix followed by unconsumed text never parses.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use recmap_types::{HandlerConfig, TypeHandlerRegistry, Value};

fn registry() -> TypeHandlerRegistry {
    TypeHandlerRegistry::with_defaults()
}

fn samples() -> Vec<(&'static str, HandlerConfig, Vec<Value>)> {
    let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
    let time = NaiveTime::from_hms_opt(23, 59, 1).unwrap();
    vec![
        (
            "string",
            HandlerConfig::default(),
            vec![Value::from("ORD2024001"), Value::from("  padded  ")],
        ),
        ("char", HandlerConfig::default(), vec![Value::Char('X')]),
        (
            "boolean",
            HandlerConfig::default(),
            vec![Value::Boolean(true), Value::Boolean(false)],
        ),
        (
            "int",
            HandlerConfig::default(),
            vec![Value::Integer(0), Value::Integer(-42), Value::Integer(i64::MAX)],
        ),
        (
            "decimal",
            HandlerConfig::default(),
            vec![Value::Decimal(10.99), Value::Decimal(-0.001)],
        ),
        ("date", HandlerConfig::default(), vec![Value::Date(date)]),
        (
            "date",
            HandlerConfig::new().pattern("%Y%m%d"),
            vec![Value::Date(date)],
        ),
        ("time", HandlerConfig::default(), vec![Value::Time(time)]),
        (
            "datetime",
            HandlerConfig::new().pattern("%Y%m%d%H%M%S"),
            vec![Value::DateTime(NaiveDateTime::new(date, time))],
        ),
    ]
}

#[test]
fn test_round_trip_law() -> anyhow::Result<()> {
    let registry = registry();
    for (type_name, config, values) in samples() {
        let handler = registry.resolve(type_name, &config)?;
        for value in values {
            let text = handler
                .format(Some(&value))?
                .ok_or_else(|| anyhow::anyhow!("{type_name} formatted to nothing"))?;
            assert_eq!(
                handler.parse(&text)?,
                Some(value.clone()),
                "{type_name} round trip of {text:?}"
            );
        }
    }
    Ok(())
}

#[test]
fn test_null_maps_to_empty_both_ways() -> anyhow::Result<()> {
    let registry = registry();
    for (type_name, config, _) in samples() {
        let handler = registry.resolve(type_name, &config)?;
        assert_eq!(handler.parse("")?, None, "{type_name}");
        assert_eq!(handler.format(None)?, None, "{type_name}");
    }
    Ok(())
}

#[test]
fn test_strictness_law() -> anyhow::Result<()> {
    let registry = registry();
    let cases = [
        ("char", HandlerConfig::default(), "XY"),
        ("boolean", HandlerConfig::default(), "trueish"),
        ("int", HandlerConfig::default(), "42abc"),
        ("decimal", HandlerConfig::default(), "10.99$"),
        ("date", HandlerConfig::default(), "2024-01-15T"),
        ("date", HandlerConfig::new().pattern("%Y%m%d"), "202401150"),
        ("time", HandlerConfig::default(), "23:59:01.5"),
        ("datetime", HandlerConfig::default(), "2024-01-15T23:59:01Z"),
    ];
    for (type_name, config, text) in cases {
        let handler = registry.resolve(type_name, &config)?;
        assert!(
            handler.parse(text).is_err(),
            "{type_name} accepted partial match {text:?}"
        );
    }
    Ok(())
}

#[test]
fn test_handlers_are_shareable_across_threads() -> anyhow::Result<()> {
    let registry = std::sync::Arc::new(registry());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let registry = std::sync::Arc::clone(&registry);
            std::thread::spawn(move || {
                let handler = registry.resolve("int", &HandlerConfig::default())?;
                handler.parse(&i.to_string())
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        let parsed = handle
            .join()
            .map_err(|_| anyhow::anyhow!("worker panicked"))??;
        assert_eq!(parsed, Some(Value::Integer(i64::try_from(i)?)));
    }
    Ok(())
}
