//! Normalizing BER into DER.
//!
//! Some CMS producers, most notably those that generate their output in a
//! streaming fashion such as gpgsm, use the indefinite length form and
//! split octet strings into a sequence of constructed fragments. Both are
//! allowed in BER but not in DER.
//!
//! The function [`ber_to_der`] takes arbitrary BER encoded data and
//! rewrites it into definite length encoding with all constructed string
//! types collapsed into their primitive form. It does not know anything
//! about the types being encoded, so it will not sort the elements of a
//! SET OF value.

use std::{error, fmt};


//------------ Constants -----------------------------------------------------

/// The maximum nesting depth we are willing to descend into.
const MAX_DEPTH: usize = 64;

/// The identifier octet of a constructed BIT STRING.
const CONSTRUCTED_BIT_STRING: u8 = 0x23;

/// The identifier octet of a constructed OCTET STRING.
const CONSTRUCTED_OCTET_STRING: u8 = 0x24;

/// The flag in the first identifier octet that marks a constructed value.
const CONSTRUCTED_FLAG: u8 = 0x20;


//------------ ber_to_der ----------------------------------------------------

/// Converts BER encoded data into DER.
///
/// All values contained in `ber` are converted, i.e., if there is more
/// than one value at top level, all of them will appear in the output.
/// It is up to the decoder of the output to decide whether that is an
/// error. Empty input is an error.
pub fn ber_to_der(ber: &[u8]) -> Result<Vec<u8>, BerError> {
    if ber.is_empty() {
        return Err(BerError::new(0, "empty input"))
    }
    let mut reader = Reader::new(ber);
    let mut res = Vec::with_capacity(ber.len());
    while !reader.is_empty() {
        reader.take_value(0)?.write_encoded(&mut res);
    }
    Ok(res)
}


//------------ Node ----------------------------------------------------------

/// A single decoded value.
///
/// Primitive content borrows from the input unless it had to be
/// assembled from the fragments of a constructed string.
#[derive(Clone, Debug)]
enum Node<'a> {
    Primitive {
        tag: Tag<'a>,
        content: Content<'a>,
    },
    Constructed {
        tag: Tag<'a>,
        children: Vec<Node<'a>>,
    }
}

#[derive(Clone, Debug)]
enum Content<'a> {
    Borrowed(&'a [u8]),
    Owned(Vec<u8>),
}

impl Content<'_> {
    fn as_slice(&self) -> &[u8] {
        match *self {
            Content::Borrowed(slice) => slice,
            Content::Owned(ref vec) => vec.as_slice(),
        }
    }
}

impl<'a> Node<'a> {
    fn encoded_len(&self) -> usize {
        let content_len = self.content_len();
        self.tag().len() + length_len(content_len) + content_len
    }

    fn content_len(&self) -> usize {
        match *self {
            Node::Primitive { ref content, .. } => content.as_slice().len(),
            Node::Constructed { ref children, .. } => {
                children.iter().map(Node::encoded_len).sum()
            }
        }
    }

    fn tag(&self) -> &Tag<'a> {
        match *self {
            Node::Primitive { ref tag, .. } => tag,
            Node::Constructed { ref tag, .. } => tag,
        }
    }

    fn write_encoded(&self, target: &mut Vec<u8>) {
        self.tag().write_encoded(target);
        write_length(self.content_len(), target);
        match *self {
            Node::Primitive { ref content, .. } => {
                target.extend_from_slice(content.as_slice())
            }
            Node::Constructed { ref children, .. } => {
                for child in children {
                    child.write_encoded(target)
                }
            }
        }
    }

    /// Collapses a constructed string into its primitive form.
    ///
    /// Returns the node unchanged if it isn’t a constructed OCTET STRING
    /// or BIT STRING. Because children are normalized before their
    /// parents, all fragments will already be primitive.
    fn flatten(self, pos: usize) -> Result<Self, BerError> {
        let (tag, children) = match self {
            Node::Constructed { tag, children } => (tag, children),
            node => return Ok(node),
        };
        match tag.single() {
            Some(CONSTRUCTED_OCTET_STRING) => {
                let mut content = Vec::new();
                for child in &children {
                    content.extend_from_slice(
                        child.fragment(tag.primitive_byte(), pos)?
                    );
                }
                Ok(Node::Primitive {
                    tag: Tag::Owned(tag.primitive_byte()),
                    content: Content::Owned(content)
                })
            }
            Some(CONSTRUCTED_BIT_STRING) => {
                let mut content = vec![0];
                let count = children.len();
                for (idx, child) in children.iter().enumerate() {
                    let frag = child.fragment(tag.primitive_byte(), pos)?;
                    let (unused, bits) = match frag.split_first() {
                        Some(some) => some,
                        None => {
                            return Err(BerError::new(
                                pos, "empty bit string fragment"
                            ))
                        }
                    };
                    if idx + 1 == count {
                        content[0] = *unused;
                    }
                    else if *unused != 0 {
                        return Err(BerError::new(
                            pos, "unused bits in inner bit string fragment"
                        ))
                    }
                    content.extend_from_slice(bits);
                }
                Ok(Node::Primitive {
                    tag: Tag::Owned(tag.primitive_byte()),
                    content: Content::Owned(content)
                })
            }
            _ => Ok(Node::Constructed { tag, children })
        }
    }

    /// Returns the content of a string fragment of the given type.
    fn fragment(&self, tag: u8, pos: usize) -> Result<&[u8], BerError> {
        match *self {
            Node::Primitive { tag: ref frag_tag, ref content }
                if frag_tag.single() == Some(tag)
            => {
                Ok(content.as_slice())
            }
            _ => Err(BerError::new(
                pos, "invalid constructed string fragment"
            ))
        }
    }
}


//------------ Tag -----------------------------------------------------------

/// The identifier octets of a value.
#[derive(Clone, Debug)]
enum Tag<'a> {
    Borrowed(&'a [u8]),
    Owned(u8),
}

impl Tag<'_> {
    fn as_slice(&self) -> &[u8] {
        match *self {
            Tag::Borrowed(slice) => slice,
            Tag::Owned(ref byte) => std::slice::from_ref(byte),
        }
    }

    fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Returns the identifier octet if the tag is a single octet.
    fn single(&self) -> Option<u8> {
        match self.as_slice() {
            [byte] => Some(*byte),
            _ => None
        }
    }

    /// Returns the identifier octet with the constructed flag cleared.
    fn primitive_byte(&self) -> u8 {
        self.as_slice().first().copied().unwrap_or(0) & !CONSTRUCTED_FLAG
    }

    fn write_encoded(&self, target: &mut Vec<u8>) {
        target.extend_from_slice(self.as_slice())
    }
}


//------------ Reader --------------------------------------------------------

/// A cursor over the BER input.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

/// The length octets of a value.
enum Length {
    Definite(usize),
    Indefinite,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    fn take_u8(&mut self) -> Result<u8, BerError> {
        match self.data.get(self.pos) {
            Some(byte) => {
                self.pos += 1;
                Ok(*byte)
            }
            None => Err(BerError::new(self.pos, "unexpected end of data"))
        }
    }

    fn take_slice(&mut self, len: usize) -> Result<&'a [u8], BerError> {
        if self.remaining().len() < len {
            return Err(BerError::new(self.pos, "unexpected end of data"))
        }
        let res = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(res)
    }

    /// Checks whether the next two octets are an end-of-contents marker.
    fn at_end_of_contents(&self) -> bool {
        self.remaining().starts_with(&[0, 0])
    }

    fn take_tag(&mut self) -> Result<(Tag<'a>, bool), BerError> {
        let start = self.pos;
        let first = self.take_u8()?;
        if first & 0x1f == 0x1f {
            // High tag number form: more octets follow while bit 8 is set.
            loop {
                if self.take_u8()? & 0x80 == 0 {
                    break
                }
            }
        }
        Ok((
            Tag::Borrowed(&self.data[start..self.pos]),
            first & CONSTRUCTED_FLAG != 0
        ))
    }

    fn take_length(&mut self) -> Result<Length, BerError> {
        let first = self.take_u8()?;
        if first < 0x80 {
            return Ok(Length::Definite(first.into()))
        }
        if first == 0x80 {
            return Ok(Length::Indefinite)
        }
        if first == 0xff {
            return Err(BerError::new(self.pos - 1, "reserved length octet"))
        }
        let count = usize::from(first & 0x7f);
        if count > std::mem::size_of::<usize>() {
            return Err(BerError::new(self.pos - 1, "length too large"))
        }
        let mut len = 0usize;
        for &byte in self.take_slice(count)? {
            len = (len << 8) | usize::from(byte);
        }
        Ok(Length::Definite(len))
    }

    /// Takes a single value including everything nested inside it.
    fn take_value(&mut self, depth: usize) -> Result<Node<'a>, BerError> {
        if depth > MAX_DEPTH {
            return Err(BerError::new(self.pos, "nesting too deep"))
        }
        if self.at_end_of_contents() {
            return Err(BerError::new(
                self.pos, "unexpected end-of-contents marker"
            ))
        }
        let start = self.pos;
        let (tag, constructed) = self.take_tag()?;
        let length = self.take_length()?;

        if !constructed {
            return match length {
                Length::Definite(len) => {
                    Ok(Node::Primitive {
                        tag, content: Content::Borrowed(self.take_slice(len)?)
                    })
                }
                Length::Indefinite => {
                    Err(BerError::new(
                        start, "indefinite length for primitive value"
                    ))
                }
            }
        }

        let mut children = Vec::new();
        match length {
            Length::Definite(len) => {
                let mut inner = Reader {
                    data: &self.data[..self.pos + self.checked_len(len)?],
                    pos: self.pos,
                };
                while !inner.is_empty() {
                    children.push(inner.take_value(depth + 1)?);
                }
                self.pos = inner.pos;
            }
            Length::Indefinite => {
                loop {
                    if self.is_empty() {
                        return Err(BerError::new(
                            self.pos, "missing end-of-contents marker"
                        ))
                    }
                    if self.at_end_of_contents() {
                        self.pos += 2;
                        break
                    }
                    children.push(self.take_value(depth + 1)?);
                }
            }
        }
        Node::Constructed { tag, children }.flatten(start)
    }

    /// Checks that `len` octets are still available.
    fn checked_len(&self, len: usize) -> Result<usize, BerError> {
        if self.remaining().len() < len {
            Err(BerError::new(self.pos, "unexpected end of data"))
        }
        else {
            Ok(len)
        }
    }
}


//------------ Helper Functions ----------------------------------------------

fn length_len(len: usize) -> usize {
    if len < 0x80 {
        1
    }
    else {
        1 + ((usize::BITS - len.leading_zeros()) as usize + 7) / 8
    }
}

fn write_length(len: usize, target: &mut Vec<u8>) {
    if len < 0x80 {
        target.push(len as u8);
    }
    else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|&&byte| byte == 0).count();
        target.push(0x80 | (bytes.len() - skip) as u8);
        target.extend_from_slice(&bytes[skip..]);
    }
}


//------------ BerError ------------------------------------------------------

/// The BER input was malformed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BerError {
    pos: usize,
    msg: &'static str,
}

impl BerError {
    fn new(pos: usize, msg: &'static str) -> Self {
        BerError { pos, msg }
    }

    /// Returns the offset into the input where the error was detected.
    pub fn pos(&self) -> usize {
        self.pos
    }
}

impl fmt::Display for BerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "malformed BER at offset {}: {}", self.pos, self.msg)
    }
}

impl error::Error for BerError { }


//============ Tests =========================================================
