use langsync::traits::Parser;
use langsync::{Error, FlatDocument, FormatType, SerializeContext, create_parser, create_parser_by_id};

/// A representative source-locale (`en`) file for every format.
fn fixture(format: FormatType) -> &'static str {
    match format {
        FormatType::Json => {
            r#"{"home": {"title": "Welcome", "links": ["Docs", "Blog"]}, "bye": "Goodbye"}"#
        }
        FormatType::Yaml => "home:\n  title: Welcome\n  links:\n    - Docs\n    - Blog\nbye: Goodbye\n",
        FormatType::YamlRootKey => "en:\n  home:\n    title: Welcome\n  menu: Menu\n  bye: Goodbye\n",
        FormatType::Arb => {
            r#"{"@@locale": "en", "title": "Welcome", "@title": {"description": "Page title"}, "menu": "Menu", "bye": "Goodbye"}"#
        }
        FormatType::Properties => "# Labels\nhome.title=Welcome\nmenu=Menu\nbye=Goodbye\n",
        FormatType::Strings => "/* Title */\n\"home.title\" = \"Welcome\";\n\"menu\" = \"Menu\";\n\"bye\" = \"Goodbye\";\n",
        FormatType::Stringsdict => concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<plist version=\"1.0\">\n",
            "<dict>\n",
            "\t<key>files</key>\n",
            "\t<dict>\n",
            "\t\t<key>NSStringLocalizedFormatKey</key>\n",
            "\t\t<string>%#@count@</string>\n",
            "\t\t<key>count</key>\n",
            "\t\t<dict>\n",
            "\t\t\t<key>NSStringFormatSpecTypeKey</key>\n",
            "\t\t\t<string>NSStringPluralRuleType</string>\n",
            "\t\t\t<key>NSStringFormatValueTypeKey</key>\n",
            "\t\t\t<string>d</string>\n",
            "\t\t\t<key>one</key>\n",
            "\t\t\t<string>%d file</string>\n",
            "\t\t\t<key>other</key>\n",
            "\t\t\t<string>%d files</string>\n",
            "\t\t</dict>\n",
            "\t</dict>\n",
            "\t<key>menu</key>\n",
            "\t<string>Menu</string>\n",
            "\t<key>bye</key>\n",
            "\t<string>Goodbye</string>\n",
            "</dict>\n",
            "</plist>\n",
        ),
        FormatType::Xcstrings => concat!(
            "{\n",
            "  \"sourceLanguage\" : \"en\",\n",
            "  \"strings\" : {\n",
            "    \"title\" : {\n",
            "      \"localizations\" : {\n",
            "        \"en\" : { \"stringUnit\" : { \"state\" : \"translated\", \"value\" : \"Welcome\" } }\n",
            "      }\n",
            "    },\n",
            "    \"menu\" : {\n",
            "      \"localizations\" : {\n",
            "        \"en\" : { \"stringUnit\" : { \"state\" : \"translated\", \"value\" : \"Menu\" } }\n",
            "      }\n",
            "    },\n",
            "    \"bye\" : {\n",
            "      \"localizations\" : {\n",
            "        \"en\" : { \"stringUnit\" : { \"state\" : \"translated\", \"value\" : \"Goodbye\" } }\n",
            "      }\n",
            "    }\n",
            "  },\n",
            "  \"version\" : \"1.0\"\n",
            "}\n",
        ),
        FormatType::Android => concat!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n",
            "<resources>\n",
            "    <string name=\"title\">Welcome</string>\n",
            "    <plurals name=\"files\">\n",
            "        <item quantity=\"one\">%d file</item>\n",
            "        <item quantity=\"other\">%d files</item>\n",
            "    </plurals>\n",
            "    <string name=\"bye\">Goodbye</string>\n",
            "</resources>\n",
        ),
        FormatType::Xml => concat!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n",
            "<messages>\n",
            "  <home title=\"Start\">Welcome</home>\n",
            "  <menu>\n",
            "    <open>Open</open>\n",
            "  </menu>\n",
            "  <bye>Goodbye</bye>\n",
            "</messages>\n",
        ),
        FormatType::Csv => "id,value,note\ntitle,Welcome,header\nmenu,Menu,nav\nbye,Goodbye,footer\n",
        FormatType::Po => concat!(
            "msgid \"\"\n",
            "msgstr \"\"\n",
            "\"Content-Type: text/plain; charset=UTF-8\\n\"\n",
            "\"Language: en\\n\"\n",
            "\n",
            "msgid \"Welcome\"\n",
            "msgstr \"Welcome\"\n",
            "\n",
            "msgid \"Menu\"\n",
            "msgstr \"Menu\"\n",
            "\n",
            "msgid \"Goodbye\"\n",
            "msgstr \"Goodbye\"\n",
        ),
        FormatType::Xliff => concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<xliff version=\"1.2\" xmlns=\"urn:oasis:names:tc:xliff:document:1.2\">\n",
            "  <file source-language=\"en\" datatype=\"plaintext\" original=\"app\">\n",
            "    <body>\n",
            "      <trans-unit id=\"title\">\n",
            "        <source>Welcome</source>\n",
            "      </trans-unit>\n",
            "      <trans-unit id=\"menu\">\n",
            "        <source>Menu</source>\n",
            "      </trans-unit>\n",
            "      <trans-unit id=\"bye\">\n",
            "        <source>Goodbye</source>\n",
            "      </trans-unit>\n",
            "    </body>\n",
            "  </file>\n",
            "</xliff>\n",
        ),
        FormatType::Srt => "1\n00:00:01,000 --> 00:00:02,000\nWelcome\n\n2\n00:00:03,000 --> 00:00:04,000\nMenu\n\n3\n00:00:05,000 --> 00:00:06,000\nGoodbye\n",
        FormatType::Vtt => "WEBVTT\n\n1\n00:01.000 --> 00:02.000\nWelcome\n\n2\n00:03.000 --> 00:04.000\nMenu\n\n3\n00:05.000 --> 00:06.000\nGoodbye\n",
        FormatType::Html => concat!(
            "<!DOCTYPE html>\n",
            "<html lang=\"en\">\n",
            "<head>\n",
            "<title>Welcome</title>\n",
            "</head>\n",
            "<body>\n",
            "<p>Hello <img src=\"a.png\" alt=\"Logo\"></p>\n",
            "<p>Goodbye</p>\n",
            "</body>\n",
            "</html>\n",
        ),
        FormatType::Markdown => "# Welcome\n\nSome *text*.\n",
        FormatType::Mdx => "import Note from './note'\n\n# Welcome\n\n<Note>Hi</Note>\n",
        FormatType::Typescript => {
            "export default {\n  home: {\n    title: \"Welcome\",\n  },\n  menu: \"Menu\",\n  bye: \"Goodbye\",\n};\n"
        }
    }
}

fn source_context(raw: &str) -> SerializeContext<'_> {
    SerializeContext::new("en")
        .with_source_locale("en")
        .with_original(raw)
}

#[test]
fn test_every_fixture_parses_to_a_non_empty_document() {
    for format in FormatType::ALL {
        let doc = create_parser(format).parse(fixture(format), "en").unwrap().document;
        assert!(!doc.is_empty(), "{} parsed to nothing", format);
    }
}

#[test]
fn test_round_trip_for_every_format() {
    for format in FormatType::ALL {
        let parser = create_parser(format);
        let raw = fixture(format);
        let doc = parser.parse(raw, "en").unwrap().document;
        let out = parser
            .serialize(&doc, &source_context(raw))
            .unwrap_or_else(|e| panic!("{}: {}", format, e));
        let reparsed = parser
            .parse(&out, "en")
            .unwrap_or_else(|e| panic!("{}: {}\n{}", format, e, out));
        assert_eq!(reparsed.document, doc, "{} round trip\n{}", format, out);
    }
}

#[test]
fn test_deleted_keys_disappear_from_output() {
    for format in FormatType::ALL {
        if format.is_whole_document() {
            continue;
        }
        let parser = create_parser(format);
        let raw = fixture(format);
        let mut doc = parser.parse(raw, "en").unwrap().document;
        assert!(doc.len() >= 2, "{} fixture needs two keys", format);
        let (deleted, _) = doc.pop().unwrap();

        let out = parser.serialize(&doc, &source_context(raw)).unwrap();
        let reparsed = parser.parse(&out, "en").unwrap().document;
        assert!(!reparsed.contains_key(&deleted), "{} kept `{}`\n{}", format, deleted, out);
        assert_eq!(reparsed, doc, "{}\n{}", format, out);
    }
}

/// Whether removing `key` legitimately shifts the keys after it: array
/// items and HTML paths are numbered by position.
fn renumbers_siblings(format: FormatType, key: &str) -> bool {
    format == FormatType::Html
        || key
            .match_indices('[')
            .any(|(i, _)| key[i + 1..].starts_with(|c: char| c.is_ascii_digit()))
}

#[test]
fn test_deleting_a_middle_key_keeps_its_neighbours() {
    for format in FormatType::ALL {
        if format.is_whole_document() {
            continue;
        }
        let parser = create_parser(format);
        let raw = fixture(format);
        let mut doc = parser.parse(raw, "en").unwrap().document;
        assert!(doc.len() >= 3, "{} fixture needs three keys", format);
        let (deleted, _) = doc.shift_remove_index(1).unwrap();

        let out = parser.serialize(&doc, &source_context(raw)).unwrap();
        let reparsed = parser
            .parse(&out, "en")
            .unwrap_or_else(|e| panic!("{}: {}\n{}", format, e, out))
            .document;
        if renumbers_siblings(format, &deleted) {
            let expected: Vec<&String> = doc.values().collect();
            assert_eq!(reparsed.values().collect::<Vec<_>>(), expected, "{}\n{}", format, out);
        } else {
            assert!(!reparsed.contains_key(&deleted), "{} kept `{}`\n{}", format, deleted, out);
            assert_eq!(reparsed, doc, "{}\n{}", format, out);
        }
    }
}

#[test]
fn test_translated_values_reach_the_output() {
    for format in FormatType::ALL {
        let parser = create_parser(format);
        let raw = fixture(format);
        let mut doc = parser.parse(raw, "en").unwrap().document;
        if let Some(value) = doc.values_mut().last() {
            *value = "Au revoir".to_string();
        }
        let ctx = SerializeContext::new("fr")
            .with_source_locale("en")
            .with_source(raw);
        let out = parser.serialize(&doc, &ctx).unwrap();
        let reparsed = parser.parse(&out, "fr").unwrap().document;
        assert_eq!(reparsed, doc, "{}\n{}", format, out);
    }
}

#[test]
fn test_empty_document_has_a_canonical_output() {
    let empty = FlatDocument::new();
    for format in FormatType::ALL {
        let parser = create_parser(format);
        let ctx = SerializeContext::new("fr").with_source_locale("en");
        let out = parser
            .serialize(&empty, &ctx)
            .unwrap_or_else(|e| panic!("{}: {}", format, e));
        let reparsed = parser
            .parse(&out, "fr")
            .unwrap_or_else(|e| panic!("{}: {}\n{}", format, e, out));
        assert!(reparsed.document.is_empty(), "{}: {:?}", format, reparsed.document);
    }
}

#[test]
fn test_malformed_input_is_a_format_error() {
    let cases = [
        (FormatType::Json, "{\"a\": "),
        (FormatType::Yaml, "a: [1, 2"),
        (FormatType::Android, "<resources><string name=\"a\">x</resources>"),
        (FormatType::Csv, "key,text\na,b\n"),
        (FormatType::Vtt, "00:00.000 --> 00:01.000\nHi\n"),
        (FormatType::Typescript, "export default { a: f() };"),
    ];
    for (format, raw) in cases {
        match create_parser(format).parse(raw, "en") {
            Err(Error::Format { format: name, message }) => {
                assert_eq!(name, format.to_string());
                assert!(!message.is_empty());
            }
            other => panic!("{}: unexpected {:?}", format, other),
        }
    }
}

#[test]
fn test_unknown_format_identifier_fails_fast() {
    match create_parser_by_id("docx") {
        Err(Error::UnsupportedFormat(id)) => assert_eq!(id, "docx"),
        other => panic!("unexpected {:?}", other.map(|p| p.format_type())),
    }
}
