#![allow(dead_code)]

use gpm_admx::admx::parse_admx;
use gpm_admx::{AdmxFile, Policy};
use std::path::PathBuf;

pub const KEY: &str = r"Software\Policies\Contoso";

pub const FIXTURE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<policyDefinitions revision="1.0" schemaVersion="1.0">
  <policyNamespaces>
    <target prefix="contoso" namespace="Contoso.Policies" />
  </policyNamespaces>
  <resources minRequiredRevision="1.0" />
  <categories>
    <category name="Root" displayName="$(string.Root)" />
  </categories>
  <policies>
    <policy name="Simple" class="Machine" displayName="$(string.Simple)"
            key="Software\Policies\Contoso" valueName="Simple">
      <parentCategory ref="Root" />
    </policy>

    <policy name="Limit" class="Machine" displayName="$(string.Limit)"
            key="Software\Policies\Contoso" valueName="LimitOn">
      <parentCategory ref="Root" />
      <enabledValue><decimal value="1" /></enabledValue>
      <disabledValue><decimal value="0" /></disabledValue>
      <elements>
        <decimal id="Limit" valueName="Limit" minValue="1" maxValue="100" />
        <decimal id="LimitText" valueName="LimitText" storeAsText="true" required="true" />
      </elements>
    </policy>

    <policy name="Checkbox" class="User" displayName="$(string.Checkbox)"
            key="Software\Policies\Contoso\Box">
      <parentCategory ref="Root" />
      <elements>
        <boolean id="Flag" valueName="Flag" />
      </elements>
    </policy>

    <policy name="Mode" class="Both" displayName="$(string.Mode)"
            key="Software\Policies\Contoso\Mode">
      <parentCategory ref="Root" />
      <elements>
        <enum id="Mode" valueName="Mode">
          <item displayName="$(string.Fast)">
            <value><decimal value="1" /></value>
            <valueList>
              <item valueName="Extra"><value><string>fast</string></value></item>
            </valueList>
          </item>
          <item displayName="$(string.Slow)">
            <value><decimal value="2" /></value>
          </item>
        </enum>
      </elements>
    </policy>

    <policy name="Route" class="Machine" displayName="$(string.Route)"
            key="Software\Policies\Contoso\Route">
      <parentCategory ref="Root" />
      <elements>
        <enum id="Route" valueName="Route">
          <item displayName="$(string.Direct)">
            <value><decimal value="1" /></value>
            <valueList>
              <item valueName="Direct"><value><decimal value="1" /></value></item>
            </valueList>
          </item>
          <item displayName="$(string.ViaProxy)">
            <value><decimal value="1" /></value>
            <valueList>
              <item valueName="Proxy"><value><string>proxy.contoso.com</string></value></item>
            </valueList>
          </item>
          <item displayName="$(string.Off)">
            <value><decimal value="0" /></value>
          </item>
        </enum>
      </elements>
    </policy>

    <policy name="Servers" class="Machine" displayName="$(string.Servers)"
            key="Software\Policies\Contoso\Servers">
      <parentCategory ref="Root" />
      <elements>
        <list id="Servers" />
      </elements>
    </policy>

    <policy name="Extras" class="Machine" displayName="$(string.Extras)"
            key="Software\Policies\Contoso\Extras" valueName="ExtrasOn">
      <parentCategory ref="Root" />
      <elements>
        <list id="Extras" additive="true" valuePrefix="Item" />
      </elements>
    </policy>

    <policy name="Pairs" class="Machine" displayName="$(string.Pairs)"
            key="Software\Policies\Contoso\Pairs">
      <parentCategory ref="Root" />
      <elements>
        <list id="Pairs" explicitValue="true" expandable="true" />
      </elements>
    </policy>

    <policy name="Banner" class="User" displayName="$(string.Banner)"
            key="Software\Policies\Contoso\Banner">
      <parentCategory ref="Root" />
      <elements>
        <text id="Message" valueName="Message" required="true" expandable="true" />
        <multiText id="Lines" valueName="Lines" />
      </elements>
    </policy>
  </policies>
</policyDefinitions>
"#;

pub fn fixture() -> AdmxFile {
    parse_admx(FIXTURE, &PathBuf::from("contoso.admx")).expect("fixture parses")
}

pub fn policy(name: &str) -> Policy {
    fixture()
        .policies
        .into_iter()
        .find(|p| p.name == name)
        .expect("policy in fixture")
}
