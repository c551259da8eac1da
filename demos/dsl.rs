use segquery::{compile_query, AttributeType, Dataset, PreviewConfig, RowCap, SegmentDefinition};

fn main() {
    let def = SegmentDefinition::from_file("demos/young_hanoi.seg")
        .expect("failed to load segment");

    let customers = Dataset::new("customers")
        .attribute("city", AttributeType::Text)
        .attribute("age", AttributeType::Number)
        .attribute("spend", AttributeType::Number);

    let query = compile_query(&customers, &def, &PreviewConfig::default(), RowCap::Preview);

    println!("Segment: {}", def.name);
    println!("SQL:     {query}");
    println!("Params:  {:?}", query.params);
    println!("Copy:    {}", query.to_inline_sql());
}
