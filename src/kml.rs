//! Very simple functions for producing KML files of hotspots and reports for the map.
//!
//! This is not a general solution at all. It's a streaming API with only the parts needed here,
//! which means the user is responsible for closing all tags.

use crate::HazardResult;
use chrono::{DateTime, Utc};
use std::{
    borrow::Cow,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// A KML document being written to a file. The document is closed when this is dropped.
pub struct KmlFile(BufWriter<File>);

impl KmlFile {
    pub fn start_document<P: AsRef<Path>>(pth: P) -> HazardResult<Self> {
        let p = pth.as_ref();

        let f = std::fs::File::create(p)?;
        let mut new = KmlFile(BufWriter::new(f));
        new.write_header()?;
        Ok(new)
    }
}

impl KmlWriter for KmlFile {
    fn output(&mut self) -> &mut dyn Write {
        &mut self.0
    }
}

impl Drop for KmlFile {
    fn drop(&mut self) {
        self.finish_document();
        let _ = self.0.flush();
    }
}

/// Write KML into memory, mostly useful for testing.
impl KmlWriter for Vec<u8> {
    fn output(&mut self) -> &mut dyn Write {
        self
    }
}

/// Replace the characters that can't appear as-is in XML text.
pub(crate) fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }

    let mut escaped = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }

    Cow::Owned(escaped)
}

pub trait KmlWriter {
    fn output(&mut self) -> &mut dyn Write;

    /// Put the XML header and open the document.
    fn write_header(&mut self) -> HazardResult<()> {
        const HEADER: &str = concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            "\n",
            r#"<kml xmlns="http://www.opengis.net/kml/2.2">"#,
            "\n",
            "<Document>\n"
        );

        self.output().write_all(HEADER.as_bytes())?;

        Ok(())
    }

    /// Close a document.
    fn finish_document(&mut self) {
        const FOOTER: &str = concat!(r#"</Document>"#, "\n", r#"</kml>"#, "\n");
        let _ = self.output().write_all(FOOTER.as_bytes());
    }

    /// Write a description element to the file.
    fn write_description(&mut self, description: &str) -> HazardResult<()> {
        // A CDATA section can't contain its own terminator, so split it across two sections.
        let description = description.replace("]]>", "]]]]><![CDATA[>");
        writeln!(
            self.output(),
            "<description><![CDATA[{}]]></description>",
            description
        )?;
        Ok(())
    }

    /// Start a KML folder.
    fn start_folder(
        &mut self,
        name: Option<&str>,
        description: Option<&str>,
        is_open: bool,
    ) -> HazardResult<()> {
        self.output().write_all("<Folder>\n".as_bytes())?;

        if let Some(name) = name {
            writeln!(self.output(), "<name>{}</name>", escape(name))?;
        }

        if let Some(description) = description {
            self.write_description(description)?;
        }

        if is_open {
            self.output().write_all("<open>1</open>\n".as_bytes())?;
        }

        Ok(())
    }

    /// Close out a folder element
    fn finish_folder(&mut self) -> HazardResult<()> {
        writeln!(self.output(), "</Folder>")?;
        Ok(())
    }

    /// Start a placemark element.
    fn start_placemark(
        &mut self,
        name: Option<&str>,
        description: Option<&str>,
        style_url: Option<&str>,
    ) -> HazardResult<()> {
        writeln!(self.output(), "<Placemark>")?;

        if let Some(name) = name {
            writeln!(self.output(), "<name>{}</name>", escape(name))?;
        }

        if let Some(description) = description {
            self.write_description(description)?;
        }

        if let Some(style_url) = style_url {
            writeln!(self.output(), "<styleUrl>{}</styleUrl>", style_url)?;
        }

        Ok(())
    }

    /// Close out a placemark element.
    fn finish_placemark(&mut self) -> HazardResult<()> {
        writeln!(self.output(), "</Placemark>")?;
        Ok(())
    }

    /// Start a style definition.
    fn start_style(&mut self, style_id: Option<&str>) -> HazardResult<()> {
        if let Some(style_id) = style_id {
            writeln!(self.output(), "<Style id=\"{}\">", style_id)?;
        } else {
            writeln!(self.output(), "<Style>")?;
        }
        Ok(())
    }

    /// Close out a style definition.
    fn finish_style(&mut self) -> HazardResult<()> {
        writeln!(self.output(), "</Style>")?;
        Ok(())
    }

    /// Create a PolyStyle element.
    ///
    /// These should ONLY go inside a style element. Colors are KML aabbggrr hex strings.
    fn create_poly_style(
        &mut self,
        color: Option<&str>,
        filled: bool,
        outlined: bool,
    ) -> HazardResult<()> {
        writeln!(self.output(), "<PolyStyle>")?;

        if let Some(color) = color {
            writeln!(self.output(), "<color>{}</color>", color)?;
            writeln!(self.output(), "<colorMode>normal</colorMode>")?;
        } else {
            writeln!(self.output(), "<colorMode>random</colorMode>")?;
        }

        writeln!(self.output(), "<fill>{}</fill>", u8::from(filled))?;
        writeln!(self.output(), "<outline>{}</outline>", u8::from(outlined))?;

        writeln!(self.output(), "</PolyStyle>")?;
        Ok(())
    }

    /// Create an IconStyle element.
    fn create_icon_style(&mut self, icon_url: Option<&str>, scale: f64) -> HazardResult<()> {
        writeln!(self.output(), "<IconStyle>")?;

        if scale > 0.0 {
            writeln!(self.output(), "<scale>{}</scale>", scale)?;
        } else {
            writeln!(self.output(), "<scale>1</scale>")?;
        }

        if let Some(icon_url) = icon_url {
            writeln!(self.output(), "<Icon><href>{}</href></Icon>", icon_url)?;
        }

        writeln!(self.output(), "</IconStyle>")?;
        Ok(())
    }

    /// Write out a TimeStamp element.
    fn timestamp(&mut self, when: DateTime<Utc>) -> HazardResult<()> {
        writeln!(
            self.output(),
            "<TimeStamp><when>{}</when></TimeStamp>",
            when.format("%Y-%m-%dT%H:%M:%SZ")
        )?;
        Ok(())
    }

    /// Start a MultiGeometry
    fn start_multi_geometry(&mut self) -> HazardResult<()> {
        self.output().write_all("<MultiGeometry>\n".as_bytes())?;
        Ok(())
    }

    /// Close out a MultiGeometry
    fn finish_multi_geometry(&mut self) -> HazardResult<()> {
        self.output().write_all("</MultiGeometry>\n".as_bytes())?;
        Ok(())
    }

    /// Start a Polygon element.
    fn start_polygon(
        &mut self,
        extrude: bool,
        tessellate: bool,
        altitude_mode: Option<&str>,
    ) -> HazardResult<()> {
        self.output().write_all("<Polygon>\n".as_bytes())?;

        if let Some(altitude_mode) = altitude_mode {
            debug_assert!(
                altitude_mode == "clampToGround"
                    || altitude_mode == "relativeToGround"
                    || altitude_mode == "absolute"
            );

            writeln!(
                self.output(),
                "<altitudeMode>{}</altitudeMode>",
                altitude_mode
            )?;
        }

        if extrude {
            self.output()
                .write_all("<extrude>1</extrude>\n".as_bytes())?;
        }

        if tessellate {
            self.output()
                .write_all("<tessellate>1</tessellate>\n".as_bytes())?;
        }

        Ok(())
    }

    /// Close out a Polygon element.
    fn finish_polygon(&mut self) -> HazardResult<()> {
        self.output().write_all("</Polygon>\n".as_bytes())?;
        Ok(())
    }

    /// Start the polygon outer ring.
    ///
    /// This should only be used inside a Polygon element.
    fn polygon_start_outer_ring(&mut self) -> HazardResult<()> {
        self.output().write_all("<outerBoundaryIs>\n".as_bytes())?;
        Ok(())
    }

    /// End the polygon outer ring.
    fn polygon_finish_outer_ring(&mut self) -> HazardResult<()> {
        self.output().write_all("</outerBoundaryIs>\n".as_bytes())?;
        Ok(())
    }

    /// Start a LinearRing.
    fn start_linear_ring(&mut self) -> HazardResult<()> {
        self.output()
            .write_all("<LinearRing>\n<coordinates>\n".as_bytes())?;
        Ok(())
    }

    /// End a LinearRing.
    fn finish_linear_ring(&mut self) -> HazardResult<()> {
        self.output()
            .write_all("</coordinates>\n</LinearRing>\n".as_bytes())?;
        Ok(())
    }

    /// Add a vertex to the LinearRing
    ///
    /// Must be used inside a linear ring element.
    fn linear_ring_add_vertex(&mut self, lat: f64, lon: f64, z: f64) -> HazardResult<()> {
        writeln!(self.output(), "{},{},{}", lon, lat, z)?;
        Ok(())
    }

    /// Write out a KML Point element
    fn create_point(&mut self, lat: f64, lon: f64, z: f64) -> HazardResult<()> {
        writeln!(
            self.output(),
            "<Point>\n<coordinates>{},{},{}</coordinates>\n</Point>",
            lon,
            lat,
            z
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_escape() {
        assert!(matches!(escape("oil-spill"), Cow::Borrowed("oil-spill")));
        assert_eq!(escape("a <b> & 'c'"), "a &lt;b&gt; &amp; &apos;c&apos;");
    }

    #[test]
    fn test_placemark_output() {
        let mut kml: Vec<u8> = vec![];
        kml.write_header().unwrap();
        kml.start_placemark(Some("Tom & Jerry"), Some("x ]]> y"), Some("#report"))
            .unwrap();
        kml.create_point(10.5, -20.25, 0.0).unwrap();
        kml.finish_placemark().unwrap();
        kml.finish_document();

        let text = String::from_utf8(kml).unwrap();
        assert!(text.starts_with("<?xml"));
        assert!(text.contains("<name>Tom &amp; Jerry</name>"));
        assert!(text.contains("<description><![CDATA[x ]]]]><![CDATA[> y]]></description>"));
        assert!(text.contains("<coordinates>-20.25,10.5,0</coordinates>"));
        assert!(text.contains("<styleUrl>#report</styleUrl>"));
        assert!(text.trim_end().ends_with("</kml>"));
    }
}
