//! Whole-file conversion properties, driven through the public API with
//! in-memory suites.

use respec_core::facts::{FactKind, FactValue, RuntimeFact, RuntimeFactTable, SourceLocation};
use respec_core::report::Confidence;
use respec_ruby::config::ConversionConfig;
use respec_ruby::converter::{Converter, FileConversion};
use respec_ruby::suite::Suite;

// ============================================================================
// Helpers
// ============================================================================

fn suite_of(files: &[(&str, &str)]) -> Suite {
    let mut suite = Suite::from_sources(
        files
            .iter()
            .map(|(p, t)| (p.to_string(), t.to_string()))
            .collect(),
    );
    suite.analyze();
    suite
}

fn convert_suite(suite: &Suite) -> Vec<FileConversion> {
    let config = ConversionConfig::default();
    Converter::new(suite, &config).convert_all().unwrap()
}

fn convert_one(text: &str) -> FileConversion {
    let suite = suite_of(&[("spec/sample_spec.rb", text)]);
    convert_suite(&suite).remove(0)
}

const LEGACY: &str = "\
describe Account do
  let(:owner) { double('owner') }

  before(:each) do
    @account = Account.new(owner)   # fresh per example
  end

  it 'starts empty' do
    @account.balance.should == 0
    @account.entries.should be_empty
  end

  it 'closes' do
    lambda { @account.close! }.should_not raise_error(ClosedError)
    @account.should be_true
  end

  it 'notifies' do
    Mailer.should_receive(:deliver).with(owner)
    Mailer.stub(:ready? => true)
    @account.notify
  end

  it 'is close enough' do
    @account.rate.should be_close(0.05, 0.001)
  end
end
";

const CONVERTED: &str = "\
describe Account do
  let(:owner) { double('owner') }

  before(:each) do
    @account = Account.new(owner)   # fresh per example
  end

  it 'starts empty' do
    expect(@account.balance).to eq(0)
    expect(@account.entries).to be_empty
  end

  it 'closes' do
    expect { @account.close! }.not_to raise_error
    expect(@account).to be_truthy
  end

  it 'notifies' do
    expect(Mailer).to receive(:deliver).with(owner)
    allow(Mailer).to receive(:ready?).and_return(true)
    @account.notify
  end

  it 'is close enough' do
    expect(@account.rate).to be_within(0.001).of(0.05)
  end
end
";

// ============================================================================
// Properties
// ============================================================================

#[test]
fn converts_a_typical_spec() {
    let out = convert_one(LEGACY);
    assert_eq!(out.new_text, CONVERTED);
    assert!(out.annotations.is_empty(), "{:?}", out.annotations);
}

#[test]
fn converting_twice_changes_nothing() {
    let first = convert_one(LEGACY);
    let second = convert_one(&first.new_text);
    assert!(second.edits.is_empty(), "{:?}", second.edits);
    assert!(second.records.is_empty());
    assert_eq!(second.new_text, first.new_text);
}

#[test]
fn untouched_text_survives_byte_for_byte() {
    let src = "\
# frozen_string_literal: true
describe Thing do   # trailing comment
\tit 'tabs' do
\t\tthing.should    be_true   # odd spacing kept
\n\n
    # comment between statements
    other.should_not be_false ;  # semicolon
\tend
end  
";
    let out = convert_one(src);
    assert_eq!(
        out.new_text,
        "\
# frozen_string_literal: true
describe Thing do   # trailing comment
\tit 'tabs' do
\t\texpect(thing).to    be_truthy   # odd spacing kept
\n\n
    # comment between statements
    expect(other).not_to be_falsey ;  # semicolon
\tend
end  
"
    );

    // Everything outside the edits is copied verbatim and in order.
    let mut rebuilt = String::new();
    let mut cursor = 0;
    for edit in &out.edits {
        rebuilt.push_str(&src[cursor..edit.span.start]);
        assert_eq!(&src[edit.span.start..edit.span.end], edit.old_text);
        rebuilt.push_str(&edit.new_text);
        cursor = edit.span.end;
    }
    rebuilt.push_str(&src[cursor..]);
    assert_eq!(rebuilt, out.new_text);
}

#[test]
fn accepted_edits_never_overlap() {
    let src = "\
it do
  list.should have(2).items
  foo.should_not == bar
  baz.stub(:a).and_return(1)
  example.metadata.should be_true
end
";
    let out = convert_one(src);
    assert!(!out.edits.is_empty());
    for pair in out.edits.windows(2) {
        assert!(
            pair[0].span.end <= pair[1].span.start,
            "{:?} overlaps {:?}",
            pair[0].span,
            pair[1].span
        );
    }
}

#[test]
fn missing_facts_fall_back_to_annotations() {
    let src = "\
it do
  team.should have(3).players
  user.stub(name: 'a', age: 3)
  value.should =~ expected
  action.should raise_error
end
";
    let out = convert_one(src);
    let kinds: Vec<&str> = out.annotations.iter().map(|a| a.kind.as_str()).collect();
    assert_eq!(
        kinds,
        vec!["have_items", "method_stub", "operator_matcher", "should", "should"]
    );
    assert!(out.new_text.contains("have(3).players"));
    assert!(out.new_text.contains("user.stub(name: 'a', age: 3)"));
    assert!(out.new_text.contains("value.should =~ expected"));
    assert!(out.new_text.contains("action.should raise_error"));
    assert!(out.annotations.iter().all(|a| !a.reason.is_empty()));
}

#[test]
fn a_broken_file_does_not_stop_the_others() {
    let suite = suite_of(&[
        ("spec/a_spec.rb", "it { a.should be_true }\n"),
        ("spec/b_spec.rb", "it { b.should be_true \n"),
        ("spec/c_spec.rb", "it { c.should be_false }\n"),
    ]);
    let out = convert_suite(&suite);
    assert_eq!(out.len(), 3);
    assert!(out[0].is_changed());
    assert!(out[1].syntax_error.is_some());
    assert!(!out[1].is_changed());
    assert!(out[2].is_changed());
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn deterministic_conversion_without_facts() {
    let out = convert_one("it { expect(x).to be_close(1.0, 0.01) }\n");
    assert_eq!(out.new_text, "it { expect(x).to be_within(0.01).of(1.0) }\n");
    assert_eq!(out.records.len(), 1);
    assert_eq!(out.records[0].kind, "be_close");
    assert_eq!(out.records[0].confidence, Confidence::Certain);
}

#[test]
fn receiver_kind_is_consulted_per_location() {
    let src = "\
describe Service do
  it 'configures' do
    client.stub(host: 'a', port: 1)
  end
end
";
    let mut suite = suite_of(&[("spec/one_spec.rb", src), ("spec/two_spec.rb", src)]);
    let fact = |path: &str, kind: &str| RuntimeFact {
        location: SourceLocation::new(path, 3, 5),
        kind: FactKind::ReceiverKind,
        value: FactValue::Text(kind.to_string()),
    };
    let table: RuntimeFactTable = vec![
        fact("spec/one_spec.rb", "verifying_double"),
        fact("spec/two_spec.rb", "plain_double"),
    ]
    .into_iter()
    .collect();
    suite.attach_facts(table);

    let out = convert_suite(&suite);
    assert_eq!(
        out[0].new_text,
        "\
describe Service do
  it 'configures' do
    allow(client).to receive(:host).and_return('a')
    allow(client).to receive(:port).and_return(1)
  end
end
"
    );
    assert_eq!(
        out[1].new_text,
        "\
describe Service do
  it 'configures' do
    allow(client).to receive_messages(host: 'a', port: 1)
  end
end
"
    );
}

#[test]
fn static_let_doubles_decide_without_runtime_facts() {
    let src = "\
describe Service do
  let(:client) { instance_double('Client') }
  it do
    client.stub(host: 'a', port: 1)
  end
end
";
    let out = convert_one(src);
    assert!(out.annotations.is_empty(), "{:?}", out.annotations);
    assert_eq!(
        out.new_text,
        "\
describe Service do
  let(:client) { instance_double('Client') }
  it do
    allow(client).to receive(:host).and_return('a')
    allow(client).to receive(:port).and_return(1)
  end
end
"
    );
}
