//! Integration tests for marshalling and unmarshalling through the facades

use chrono::NaiveDate;
use recmap_format::{Encoding, Format, Justify, RawRecord, Shape, XmlBinding, XmlNode};
use recmap_schema::{FieldDefinition, RecordDefinition, StreamDefinition};
use recmap_stream::{BeanAccessor, Error, MapBean, OccurrenceError, StreamFactory};
use recmap_types::Value;

/// Helper to build the `[A(max=1), B(max=2)]` stream
fn header_detail_stream() -> StreamDefinition {
    StreamDefinition::new("ab", Format::Csv)
        .record(
            RecordDefinition::new("A")
                .field(FieldDefinition::new("kind").literal("A").identifier())
                .field(FieldDefinition::new("value").at(1)),
        )
        .record(
            RecordDefinition::new("B")
                .occurs(1, Some(2))
                .field(FieldDefinition::new("kind").literal("B").identifier())
                .field(FieldDefinition::new("value").at(1)),
        )
}

/// Helper to build a fixed-length order stream
fn order_stream() -> StreamDefinition {
    StreamDefinition::new("orders", Format::FixedLength)
        .encoding(Encoding::Latin1)
        .record(
            RecordDefinition::new("order")
                .bean_type("Order")
                .field(FieldDefinition::new("kind").length(1).literal("O").identifier())
                .field(
                    FieldDefinition::new("id")
                        .at(1)
                        .length(6)
                        .type_name("int")
                        .padded('0', Justify::Right),
                )
                .field(FieldDefinition::new("customer").at(7).length(10).required())
                .field(
                    FieldDefinition::new("date")
                        .at(17)
                        .length(8)
                        .type_name("date")
                        .pattern("%Y%m%d"),
                ),
        )
}

fn factory_with(definition: &StreamDefinition) -> anyhow::Result<StreamFactory> {
    let factory = StreamFactory::new();
    factory.load(definition)?;
    Ok(factory)
}

#[test]
fn test_occurrence_law_unmarshalling() -> anyhow::Result<()> {
    let factory = factory_with(&header_detail_stream())?;

    let mut unmarshaller = factory.create_unmarshaller("ab")?;
    for line in ["A,1", "B,2", "B,3"] {
        unmarshaller.unmarshal(RawRecord::line(line))?;
    }
    unmarshaller.verify_complete()?;

    let mut unmarshaller = factory.create_unmarshaller("ab")?;
    let err = unmarshaller.unmarshal(RawRecord::line("B,1")).unwrap_err();
    assert!(matches!(
        err,
        Error::Occurrence(OccurrenceError::MissingRecord { ref missing, .. }) if missing == "A"
    ));

    let mut unmarshaller = factory.create_unmarshaller("ab")?;
    unmarshaller.unmarshal(RawRecord::line("A,1"))?;
    unmarshaller.unmarshal(RawRecord::line("B,2"))?;
    unmarshaller.unmarshal(RawRecord::line("B,3"))?;
    let err = unmarshaller.unmarshal(RawRecord::line("B,4")).unwrap_err();
    assert!(matches!(
        err,
        Error::Occurrence(OccurrenceError::TooManyOccurrences { max: 2, .. })
    ));

    unmarshaller.reset();
    unmarshaller.unmarshal(RawRecord::line("A,1"))?;
    Ok(())
}

#[test]
fn test_occurrence_law_marshalling() -> anyhow::Result<()> {
    let factory = factory_with(&header_detail_stream())?;
    let mut marshaller = factory.create_marshaller("ab")?;

    marshaller.marshal(&MapBean::new("A").with("value", "1"))?;
    assert_eq!(marshaller.to_text()?, "A,1");
    marshaller.marshal(&MapBean::new("B").with("value", "2"))?;
    marshaller.marshal(&MapBean::new("B").with("value", "3"))?;

    let err = marshaller.marshal(&MapBean::new("B")).unwrap_err();
    assert!(matches!(err, Error::Occurrence(_)));
    assert!(matches!(marshaller.to_text(), Err(Error::NothingMarshalled)));

    let err = marshaller.marshal(&MapBean::new("A")).unwrap_err();
    assert!(matches!(
        err,
        Error::Occurrence(OccurrenceError::OutOfOrder { .. })
    ));
    Ok(())
}

#[test]
fn test_retrieval_is_idempotent_and_overwritten() -> anyhow::Result<()> {
    let factory = factory_with(&header_detail_stream())?;
    let mut marshaller = factory.create_marshaller("ab")?;

    marshaller.marshal(&MapBean::new("A").with("value", "x"))?;
    assert_eq!(marshaller.to_text()?, "A,x");
    assert_eq!(marshaller.to_text()?, "A,x");
    assert_eq!(marshaller.to_string(), "A,x");
    assert_eq!(marshaller.to_list()?, vec!["A", "x"]);
    assert_eq!(marshaller.to_array()?.len(), 2);

    marshaller.marshal(&MapBean::new("B").with("value", "y"))?;
    assert_eq!(marshaller.to_text()?, "B,y");
    Ok(())
}

#[test]
fn test_shape_mismatch_for_every_format() -> anyhow::Result<()> {
    let factory = StreamFactory::new();
    for (name, format) in [
        ("fixed", Format::FixedLength),
        ("csv", Format::Csv),
        ("xml", Format::Xml),
    ] {
        let field = match format {
            Format::FixedLength => FieldDefinition::new("id").length(3),
            _ => FieldDefinition::new("id"),
        };
        let definition =
            StreamDefinition::new(name, format).record(RecordDefinition::new("r").field(field));
        factory.load(&definition)?;

        let mut marshaller = factory.create_marshaller(name)?;
        marshaller.marshal(&MapBean::new("r").with("id", "7"))?;
        assert!(!marshaller.to_text()?.is_empty());

        if format == Format::Xml {
            assert_eq!(marshaller.to_document()?.to_xml_string(), "<r><id>7</id></r>");
            for (result, shape) in [
                (marshaller.to_list().map(|_| ()), Shape::List),
                (marshaller.to_array().map(|_| ()), Shape::Array),
            ] {
                match result {
                    Err(Error::Format(recmap_format::Error::ShapeMismatch {
                        requested,
                        format: Format::Xml,
                    })) => assert_eq!(requested, shape),
                    other => panic!("expected shape mismatch, got {other:?}"),
                }
            }
        } else {
            assert_eq!(marshaller.to_list()?.len(), 1);
            assert!(matches!(
                marshaller.to_document(),
                Err(Error::Format(recmap_format::Error::ShapeMismatch {
                    requested: Shape::Document,
                    ..
                }))
            ));
        }
    }
    Ok(())
}

#[test]
fn test_fixed_length_round_trip() -> anyhow::Result<()> {
    let factory = factory_with(&order_stream())?;
    let date = NaiveDate::from_ymd_opt(2024, 3, 5).ok_or_else(|| anyhow::anyhow!("bad date"))?;

    let mut marshaller = factory.create_marshaller("orders")?;
    let order = MapBean::new("Order")
        .with("id", 42_i64)
        .with("customer", "Müller")
        .with("date", date);
    marshaller.marshal(&order)?;
    let text = marshaller.to_text()?;
    assert_eq!(text, "O000042Müller    20240305");
    assert_eq!(
        marshaller.to_list()?,
        vec!["O", "000042", "Müller    ", "20240305"]
    );

    let mut unmarshaller = factory.create_unmarshaller("orders")?;
    let bean = unmarshaller.unmarshal(RawRecord::line(text))?;
    assert_eq!(bean.bean_type(), "Order");
    assert_eq!(bean.get("kind"), Some(&Value::from("O")));
    assert_eq!(bean.get("id"), Some(&Value::Integer(42)));
    assert_eq!(bean.get("customer"), Some(&Value::from("Müller")));
    assert_eq!(bean.get("date"), Some(&Value::Date(date)));
    assert_eq!(unmarshaller.record_name(), Some("order"));
    Ok(())
}

#[test]
fn test_csv_round_trip_with_quoting() -> anyhow::Result<()> {
    let definition = StreamDefinition::new("notes", Format::Csv).record(
        RecordDefinition::new("note")
            .occurs(0, None)
            .field(FieldDefinition::new("author"))
            .field(FieldDefinition::new("text").at(1))
            .field(FieldDefinition::new("stars").at(2).type_name("int")),
    );
    let factory = factory_with(&definition)?;

    let mut marshaller = factory.create_marshaller("notes")?;
    marshaller.marshal(
        &MapBean::new("note")
            .with("author", "Ann")
            .with("text", "fast, cheap")
            .with("stars", 4_i64),
    )?;
    let text = marshaller.to_text()?;
    assert_eq!(text, "Ann,\"fast, cheap\",4");

    let mut unmarshaller = factory.create_unmarshaller("notes")?;
    let bean = unmarshaller.unmarshal(RawRecord::line(text))?;
    assert_eq!(bean.get("text"), Some(&Value::from("fast, cheap")));
    assert_eq!(bean.get("stars"), Some(&Value::Integer(4)));

    let bean = unmarshaller.unmarshal(RawRecord::tokens(["Bo", "ok", "2"]))?;
    assert_eq!(bean.get("author"), Some(&Value::from("Bo")));
    Ok(())
}

#[test]
fn test_xml_round_trip() -> anyhow::Result<()> {
    let definition = StreamDefinition::new("catalog", Format::Xml).record(
        RecordDefinition::new("item")
            .occurs(0, None)
            .xml(XmlBinding::element("item").in_namespace("urn:catalog", Some("c")))
            .field(
                FieldDefinition::new("id")
                    .type_name("int")
                    .xml(XmlBinding::attribute("id")),
            )
            .field(FieldDefinition::new("name"))
            .field(
                FieldDefinition::new("tags")
                    .occurs(0, None)
                    .xml(XmlBinding::element("tag")),
            )
            .field(FieldDefinition::new("note").occurs(0, Some(1))),
    );
    let factory = factory_with(&definition)?;

    let mut marshaller = factory.create_marshaller("catalog")?;
    let mut item = MapBean::new("item").with("id", 7_i64).with("name", "Bolt");
    item.set_property(
        "tags",
        Some(Value::List(vec![Value::from("steel"), Value::from("m8")])),
    );
    marshaller.marshal(&item)?;
    let document = marshaller.to_document()?;
    assert_eq!(
        document.to_xml_string(),
        "<c:item xmlns:c=\"urn:catalog\" id=\"7\">\
         <name>Bolt</name><tag>steel</tag><tag>m8</tag></c:item>"
    );

    let mut unmarshaller = factory.create_unmarshaller("catalog")?;
    let bean = unmarshaller.unmarshal(RawRecord::Node(document.root))?;
    assert_eq!(bean.get("id"), Some(&Value::Integer(7)));
    assert_eq!(bean.get("name"), Some(&Value::from("Bolt")));
    assert_eq!(
        bean.get("tags").and_then(Value::as_list).map(<[Value]>::len),
        Some(2)
    );
    assert_eq!(bean.get("note"), None);

    let foreign = XmlNode::new("item").in_namespace("urn:other", None);
    assert!(matches!(
        unmarshaller.unmarshal(RawRecord::Node(foreign)),
        Err(Error::UnmatchedRecord { .. })
    ));
    Ok(())
}

#[test]
fn test_invalid_record_collects_every_field() -> anyhow::Result<()> {
    let definition = StreamDefinition::new("rows", Format::Delimited)
        .delimiter('|')
        .record(
            RecordDefinition::new("row")
                .occurs(0, None)
                .field(FieldDefinition::new("code").regex("[A-Z]{3}"))
                .field(FieldDefinition::new("qty").at(1).type_name("int").required())
                .field(
                    FieldDefinition::new("due")
                        .at(2)
                        .type_name("date")
                        .pattern("%Y-%m-%d"),
                ),
        );
    let factory = factory_with(&definition)?;
    let mut unmarshaller = factory.create_unmarshaller("rows")?;

    let err = unmarshaller
        .unmarshal(RawRecord::line("abc||2024-13-01"))
        .unwrap_err();
    let fields: Vec<&str> = err.field_errors().iter().map(|e| e.field.as_str()).collect();
    assert_eq!(fields, vec!["code", "qty", "due"]);
    assert_eq!(err.field_errors()[0].rule, Some("regex"));
    assert_eq!(err.field_errors()[1].rule, Some("required"));
    assert_eq!(err.field_errors()[2].rule, None);
    assert_eq!(unmarshaller.field_text("code"), Some("abc"));

    let bean = unmarshaller.unmarshal(RawRecord::line("ABC|5|2024-12-01"))?;
    assert_eq!(bean.get("qty"), Some(&Value::Integer(5)));
    Ok(())
}

#[test]
fn test_invalid_bean_leaves_no_output() -> anyhow::Result<()> {
    let factory = factory_with(&order_stream())?;
    let mut marshaller = factory.create_marshaller("orders")?;

    let err = marshaller
        .marshal(&MapBean::new("Order").with("id", 1_i64))
        .unwrap_err();
    match err {
        Error::InvalidBean { record, errors } => {
            assert_eq!(record, "order");
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].field, "customer");
        }
        other => panic!("expected an invalid bean, got {other:?}"),
    }
    assert!(marshaller.marshalled().is_none());
    assert_eq!(marshaller.occurrences().count(0), 0);
    Ok(())
}
