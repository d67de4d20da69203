/*!

This is the long-form manual for `survey_report` and `datasuite`.

## Questionnaires

A questionnaire (a [`Schema`](crate::Schema)) is an ordered list of questions. Each
question has a stable identifier, a prompt and a kind:

* `text` free-form answer
* `choice` one of the `options` of the question
* `scale` a number between `min` and `max` (1 to 5 by default)

The answers are stored by prompt: two questions with the same prompt end up in the same
column of the dataset.

### Branch rules

Choice questions may attach an action to some of their options:

* `continue` go on with the next question (this is also what happens for options
  without a rule)
* `terminate` stop here. The answers given so far, including this one, are submitted.
* `skipTo:<id>` do not show any question until the question `<id>`.

Skips only go forward. A skip to a question that does not exist, or that does not come
after the current question, is a configuration error: the `validate` command lists them,
and a respondent hitting such a rule cannot go past the question until another option
is picked.

In the configuration file:

```json
{
  "id": "q1",
  "kind": "choice",
  "prompt": "Do you smoke?",
  "options": ["Yes", "No"],
  "branchRules": { "No": "skipTo:q4" }
}
```

## Datasets

A dataset is a table with a header row. The first column is conventionally the
`Timestamp` of the submission. The following formats are supported:

* `csv` comma separated values, also used to store the responses collected with
  `datasuite respond`
* `excel` an Excel (.xlsx) workbook, for instance the spreadsheet exported from
  Google Forms or Microsoft Forms. The worksheet is given by `excelWorksheetName`,
  or the workbook must contain exactly one worksheet.

Empty cells (or cells containing only whitespaces) are missing values. They are ignored
by all the tables.

## Reports

A report is made of chapters, each containing analysis items:

* `{ "column": "Gender" }` frequency table, percent table and a one sentence summary
* `{ "columnX": "Gender", "columnY": "Smoker" }` cross tabulation, with the values of
  `columnX` as rows and the values of `columnY` as columns

The categories of the frequency and percent tables are sorted by decreasing count, and
ties keep the order in which the values first appear in the dataset. Percentages are
rounded to one decimal. The total of the percent table is the sum of the rounded
percentages: it may be slightly different from 100.0.

An item that refers to a column that does not exist, or that is computed on an empty
dataset, is replaced by a notice in the report. The rest of the report is not affected.

The report is printed as text (the preview) and written as a Word document (.docx).
Both contain the same headings, tables and paragraphs.

*/
