// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

/// Parses a note name like "c#3" or "Fb-2" into a MIDI note number.
///
/// The name is a letter A-G (case-insensitive), an optional "#" or "b"
/// accidental, and an octave from -2 to 8. C3 is middle C (60). Returns
/// `None` for malformed names and notes outside the MIDI range.
pub fn note_number(name: &str) -> Option<u8> {
    let bytes = name.as_bytes();
    if bytes.len() < 2 || bytes.len() > 4 {
        return None;
    }

    let mut note: i32 = match bytes[0].to_ascii_lowercase() {
        b'c' => 0,
        b'd' => 2,
        b'e' => 4,
        b'f' => 5,
        b'g' => 7,
        b'a' => 9,
        b'b' => 11,
        _ => return None,
    };

    let mut index = 1;
    if bytes.get(index) == Some(&b'#') {
        note += 1;
        index += 1;
    } else if bytes.get(index) == Some(&b'b') {
        note -= 1;
        index += 1;
    }

    let mut octave_sign = 1;
    if bytes.get(index) == Some(&b'-') {
        octave_sign = -1;
        index += 1;
    }

    // Everything after the accidental and sign must be a single octave digit.
    if index + 1 != bytes.len() || !bytes[index].is_ascii_digit() {
        return None;
    }
    let octave = octave_sign * i32::from(bytes[index] - b'0');

    let number = 12 * (2 + octave) + note;
    u8::try_from(number).ok().filter(|number| *number <= 127)
}
