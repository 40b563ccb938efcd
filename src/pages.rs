//! Server-rendered HTML: interval tables, circle of fifths and the live
//! chord viewer.

use std::fmt::Write;

use crate::theory::{PitchClass, Scale, ScaleKind, SpecificChord, SpecificNote};

const STYLE: &str = r#"
<style>
    :root {
        --major: #FFFFFF;
        --dorian: #54E346;
        --phrygian: #00FFCC;
        --lydian: #68A6FC;
        --mixolydian: #FFF47D;
        --minor: #D83A56;
        --locrian: #B980F0;
    }
    body { font-family: 'SF Mono', monospace; }
    table, td { font-size: 0.8em; border: 1px solid #dddddd; }
    td { width: 50px; height: 50px; }
    td.C_col { border-left: 1px solid black; }
    td.C_row { border-top: 1px solid black; }
    .major { background-color: var(--major); }
    .dorian { background-color: var(--dorian); }
    .phrygian { background-color: var(--phrygian); }
    .lydian { background-color: var(--lydian); }
    .mixolydian { background-color: var(--mixolydian); }
    .minor { background-color: var(--minor); }
    .locrian { background-color: var(--locrian); }
    td.greyed { color: rgba(0, 0, 0, 0.1); background-color: rgba(0, 0, 0, 0.1); }
    .chord_button { cursor: pointer; padding: 0 4px; }
</style>
"#;

fn document(body_class: &str, body: &str) -> String {
    format!(
        r#"<html>
<head>
<script src="/static/play.js"></script>
{STYLE}
</head>
<body class='{body_class}'>
{body}
</body>
</html>
"#
    )
}

pub fn scale_not_found() -> String {
    document(
        "",
        "<header><a href='/'>home</a></header>\n<h1>404: scale not found</h1>",
    )
}

/// Diads (`lowest == None`) or triads over every pair of notes in `range`.
pub fn interval_table(
    scale: &Scale,
    range: &[SpecificNote],
    lowest: Option<SpecificNote>,
) -> String {
    let mut rows = String::new();
    for &row_note in range {
        rows.push_str("<tr>\n");
        for &col_note in range {
            let chord = match lowest {
                Some(lowest) => SpecificChord::new([lowest, row_note, col_note]),
                None => SpecificChord::new([row_note, col_note]),
            };
            let classes = cell_classes(scale, &chord, row_note, col_note).join(" ");
            let _ = writeln!(
                rows,
                "    <td class='{classes}' onclick=play_chord('{chord}')>{chord}</td>"
            );
        }
        rows.push_str("</tr>\n");
    }

    let (heading, body_class) = match lowest {
        Some(lowest) => (
            format!("<h1>triads lowest={lowest}</h1>"),
            scale.mode_of(lowest.pitch).map_or("", ScaleKind::name),
        ),
        None => ("<h1>diads</h1>".to_string(), "major"),
    };
    let nav = match lowest {
        Some(lowest) => {
            let param = lowest.to_string().replace('#', "%23");
            format!(
                "<a href='/triads/lowest_down?lowest={param}'>lowest_down</a>\n\
                 <a href='/triads/lowest_up?lowest={param}'>lowest_up</a>"
            )
        }
        None => String::new(),
    };
    let body = format!(
        "{heading}\n<a href='/diads'>diads</a>\n<a href='/triads'>triads</a>\n<a href='/live'>live</a><br>\n<br>\n{nav}\n<table>\n<tbody>\n{rows}</tbody>\n</table>"
    );
    document(body_class, &body)
}

fn cell_classes(
    scale: &Scale,
    chord: &SpecificChord,
    row_note: SpecificNote,
    col_note: SpecificNote,
) -> Vec<&'static str> {
    let mut classes = Vec::new();
    if col_note.pitch == PitchClass::C {
        classes.push("C_col");
    }
    if row_note.pitch == PitchClass::C {
        classes.push("C_row");
    }

    // interval between the two highest notes
    let len = chord.len();
    let below = len.checked_sub(2).and_then(|i| chord.note(i));
    let top = chord.note(len.saturating_sub(1));
    let top_interval = match (below, top) {
        (Some(below), Some(top)) => top - below,
        _ => 0,
    };
    if top_interval >= 12 || row_note < col_note {
        classes.push("greyed");
    } else if let Some(mode) = scale.mode_of(col_note.pitch) {
        classes.push(mode.name());
    }
    classes
}

pub fn available_scales() -> String {
    let mut body = String::from("<h1>Available scales for circle of fifths</h1>\n");
    for kind in ScaleKind::ALL {
        let _ = writeln!(body, "<a href='/circle/{kind}/'>/circle/{kind}/</a><br>");
    }
    document("", &body)
}

/// Every scale of `kind` around the circle of fifths, with its notes and
/// diatonic triads voiced from octave 4.
pub fn circle(kind: ScaleKind) -> String {
    let mut body = format!(
        "<h1>circle of fifths: {kind}</h1>\n<a href='/available_scales'>all scales</a>\n<table>\n"
    );
    for scale in Scale::circle_of_fifths(kind) {
        let root = SpecificNote::new(scale.root, 4);
        let _ = write!(body, "<tr class='{kind}'><td>{}</td><td>", scale.name());
        for step in 0..7 {
            let Ok(note) = scale.add_note(root, step) else {
                continue;
            };
            let _ = write!(
                body,
                "<span class='chord_button' onclick=play_note('{}/{}')>{}</span>",
                note.pitch, note.octave, note.pitch
            );
        }
        body.push_str("</td><td>");
        for step in 0..7 {
            let Ok(notes) = [0, 2, 4]
                .into_iter()
                .map(|d| scale.add_note(root, step + d))
                .collect::<Result<Vec<_>, _>>()
            else {
                continue;
            };
            let triad = SpecificChord::new(notes);
            let _ = write!(
                body,
                "<span class='chord_button' onclick=play_chord('{triad}')>{}</span>",
                triad.abstract_chord()
            );
        }
        body.push_str("</td></tr>\n");
    }
    body.push_str("</table>");
    document("", &body)
}

pub fn live(scale: &Scale) -> String {
    let body = format!(
        r#"<h1>live chords in {}</h1>
<a href='/diads'>diads</a>
<a href='/triads'>triads</a>
<a href='/available_scales'>scales</a>
<h2 id='chord'>&lt;empty&gt;</h2>
<h3 id='chord_abstract'></h3>
<div id='possibilities'></div>
<script src="/static/live.js"></script>"#,
        scale.name()
    );
    document("", &body)
}
