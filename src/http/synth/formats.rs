use crate::http::response::OutgoingResponse;
use http::StatusCode;
use serde_json::json;

const SAMPLE_HTML: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <title>echobin - HTML Response</title>
  </head>
  <body>
    <h1>Herman Melville - Moby-Dick</h1>
    <p>
      Call me Ishmael. Some years ago, never mind how long precisely, having little or no money
      in my purse, and nothing particular to interest me on shore, I thought I would sail about a
      little and see the watery part of the world.
    </p>
  </body>
</html>
"#;

const SAMPLE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<slideshow title="Sample Slide Show" date="Date of publication" author="Yours Truly">
  <slide type="all">
    <title>Wake up to WonderWidgets!</title>
  </slide>
  <slide type="all">
    <title>Overview</title>
    <item>Why <em>WonderWidgets</em> are great</item>
    <item>Who <em>buys</em> WonderWidgets</item>
  </slide>
</slideshow>
"#;

const ROBOTS_TXT: &str = "User-agent: *\nDisallow: /deny\n";

pub(super) fn json() -> OutgoingResponse {
    OutgoingResponse::json(
        StatusCode::OK,
        &json!({
            "slideshow": {
                "author": "Yours Truly",
                "date": "date of publication",
                "slides": [
                    { "title": "Wake up to WonderWidgets!", "type": "all" },
                    {
                        "items": [
                            "Why <em>WonderWidgets</em> are great",
                            "Who <em>buys</em> WonderWidgets"
                        ],
                        "title": "Overview",
                        "type": "all"
                    }
                ],
                "title": "Sample Slide Show"
            }
        }),
    )
}

pub(super) fn html() -> OutgoingResponse {
    OutgoingResponse::html(SAMPLE_HTML)
}

pub(super) fn xml() -> OutgoingResponse {
    OutgoingResponse::xml(SAMPLE_XML)
}

pub(super) fn robots_txt() -> OutgoingResponse {
    OutgoingResponse::text(ROBOTS_TXT)
}
